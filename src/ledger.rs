//! Remote ledger client (Google Apps Script sheet endpoint)
//!
//! One user-supplied URL, POST only, three actions: list, bulkAdd, delete.
//! The endpoint is an arbitrary script-backed sheet whose HTTP status codes
//! cannot be trusted, so the response body's own `status` field is the
//! authoritative success signal; HTTP status is the fallback only when the
//! body is unparsable.
//!
//! Error displays are user-facing Spanish: the reconciler splices them
//! straight into chat fragments.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expense::Expense;

/// list() timeout. First-time setup with a wrong or unpublished script URL
/// is the dominant failure mode, so expiry gets a configuration hint.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "la planilla no respondió a tiempo: revisá que la URL sea la de \
         implementación del script (termina en /exec) y que el acceso sea \
         \"Cualquier persona\""
    )]
    Timeout,
    #[error(
        "no pude leer la planilla ({0}): revisá que la URL del script sea \
         correcta y esté publicada"
    )]
    Unreachable(String),
    #[error("no pude conectarme a la planilla: {0}")]
    Transport(String),
    #[error("la planilla devolvió una respuesta inesperada: {0}")]
    BadResponse(String),
    #[error("la planilla informó un error: {0}")]
    Remote(String),
    #[error("el gasto no existe en la planilla")]
    NotFound,
}

/// Remote ledger operations. A trait so tests can stand in a fake sheet.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Fetch the full remote ledger.
    async fn list(&self) -> Result<Vec<Expense>, LedgerError>;

    /// Append many records in one round trip. Reports success or surfaces
    /// the remote error; never partially applies from this side.
    async fn bulk_add(&self, expenses: &[Expense]) -> Result<(), LedgerError>;

    /// Remove one record by id. A remote "not_found" is a failure here,
    /// never silently treated as success.
    async fn delete(&self, id: &str) -> Result<(), LedgerError>;
}

#[derive(Serialize)]
struct ListRequest {
    action: &'static str,
}

#[derive(Serialize)]
struct BulkAddRequest<'a> {
    action: &'static str,
    expenses: &'a [Expense],
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    action: &'static str,
    id: &'a str,
}

/// Response envelope produced by the sheet script
#[derive(Debug, Deserialize)]
struct LedgerReply {
    status: Option<String>,
    #[serde(default)]
    data: Option<Vec<Expense>>,
    message: Option<String>,
    #[serde(default)]
    count: Option<u64>,
}

/// Classify a response using the body's status field first, HTTP second.
fn parse_reply(http_status: reqwest::StatusCode, body: &str) -> Result<LedgerReply, LedgerError> {
    let reply: LedgerReply = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            if !http_status.is_success() {
                return Err(LedgerError::Remote(format!("HTTP {}", http_status)));
            }
            let preview: String = body.chars().take(200).collect();
            return Err(LedgerError::BadResponse(format!("{} ({})", preview, e)));
        }
    };

    match reply.status.as_deref() {
        Some("success") | Some("deleted") => Ok(reply),
        Some("not_found") => Err(LedgerError::NotFound),
        Some(other) => Err(LedgerError::Remote(
            reply.message.unwrap_or_else(|| other.to_string()),
        )),
        None => {
            if http_status.is_success() {
                Err(LedgerError::BadResponse("sin campo 'status'".into()))
            } else {
                Err(LedgerError::Remote(format!("HTTP {}", http_status)))
            }
        }
    }
}

/// HTTP client for the sheet script endpoint
pub struct SheetsLedger {
    http: reqwest::Client,
    url: String,
}

impl SheetsLedger {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    async fn post<T: Serialize>(
        &self,
        request: &T,
        timeout: Option<Duration>,
    ) -> Result<LedgerReply, LedgerError> {
        let mut builder = self.http.post(&self.url).json(request);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LedgerError::Timeout
            } else {
                LedgerError::Transport(e.to_string())
            }
        })?;

        let http_status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        parse_reply(http_status, &body)
    }
}

#[async_trait]
impl Ledger for SheetsLedger {
    async fn list(&self) -> Result<Vec<Expense>, LedgerError> {
        let reply = self
            .post(&ListRequest { action: "list" }, Some(LIST_TIMEOUT))
            .await
            .map_err(|e| match e {
                // setup failures get the configuration hint, not a raw
                // transport error
                LedgerError::Transport(detail) => LedgerError::Unreachable(detail),
                other => other,
            })?;

        reply
            .data
            .ok_or_else(|| LedgerError::BadResponse("respuesta sin 'data'".into()))
    }

    async fn bulk_add(&self, expenses: &[Expense]) -> Result<(), LedgerError> {
        let reply = self
            .post(
                &BulkAddRequest {
                    action: "bulkAdd",
                    expenses,
                },
                None,
            )
            .await?;

        if let Some(count) = reply.count {
            if count as usize != expenses.len() {
                tracing::warn!(sent = expenses.len(), count, "bulkAdd count mismatch");
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), LedgerError> {
        self.post(
            &DeleteRequest {
                action: "delete",
                id,
            },
            None,
        )
        .await?;
        Ok(())
    }
}
