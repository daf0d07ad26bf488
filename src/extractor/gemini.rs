//! Gemini generateContent API client
//!
//! Implements the subset of the Generative Language API the bot needs:
//! - single-turn content generation with a system instruction
//! - function calling against declared tools
//!
//! No client-enforced timeout here beyond reqwest defaults; the ledger is
//! the only collaborator with an explicit one.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-3-flash-preview";

/// Request to generateContent
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction")]
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolConfig>,
}

/// A content block: role plus parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn system_text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

/// A part carries text, a function call, or something newer this client
/// ignores. Optional fields rather than an enum so unknown part kinds do not
/// fail the whole parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A named operation invocation emitted by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Tool wrapper: Gemini nests declarations one level deep
#[derive(Debug, Clone, Serialize)]
pub struct ToolConfig {
    #[serde(rename = "functionDeclarations")]
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// One callable operation declared to the model
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Response from generateContent
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

/// A function call lifted out of the response parts
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    pub name: String,
    pub args: Value,
}

impl GenerateResponse {
    fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// All function calls, in the order the model emitted them. A single
    /// utterance may legitimately produce several.
    pub fn function_calls(&self) -> Vec<RawCall> {
        self.parts()
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .map(|fc| RawCall {
                name: fc.name.clone(),
                args: fc.args.clone(),
            })
            .collect()
    }

    /// Concatenated text parts, if any.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(""))
        }
    }
}

/// Gemini API client
pub struct Client {
    http: reqwest::Client,
    api_key: String,
}

impl Client {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Single-turn generation with tools.
    pub async fn generate(
        &self,
        utterance: &str,
        system_instruction: &str,
        declarations: Vec<FunctionDeclaration>,
    ) -> Result<GenerateResponse> {
        let request = GenerateRequest {
            contents: vec![Content::user_text(utterance)],
            system_instruction: Content::system_text(system_instruction),
            tools: vec![ToolConfig {
                function_declarations: declarations,
            }],
        };

        let url = format!("{}/{}:generateContent", API_BASE, MODEL);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error {}: {}", status, body);
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

/// Decode a generateContent body. The error preview truncates by characters,
/// not bytes; Gemini error bodies carry accented Spanish and a byte slice
/// could land mid-character.
fn parse_response(text: &str) -> Result<GenerateResponse> {
    serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(500).collect();
        anyhow::anyhow!("JSON parse error: {}. Response preview: {}", e, preview)
    })
}
