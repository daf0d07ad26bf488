//! Telegram bridge: feeds externally received messages into the same
//! reconciliation pipeline as the chat shell
//!
//! A repeating long-poll loop with a fixed inter-poll delay. The last
//! processed update id is a monotone cursor owned by the loop and persisted
//! through `CursorStore`; an update whose id is at or below the cursor is
//! never re-processed. A shutdown request only prevents the next poll cycle,
//! it never aborts an in-flight reconciliation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

use crate::pipeline::ChatPipeline;

const TELEGRAM_API: &str = "https://api.telegram.org";
/// Server-side long-poll window (seconds); the HTTP timeout must exceed it.
const LONG_POLL_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesReply {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(serde::Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

/// Transport seam for the poll loop. A trait so tests can script incoming
/// updates and capture outgoing replies.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Long-poll for updates at or above `offset`.
    async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Bot API client
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()
            .context("failed to build telegram http client")?;
        Ok(Self {
            http,
            base: format!("{}/bot{}", TELEGRAM_API, token),
        })
    }
}

#[async_trait]
impl BridgeTransport for TelegramClient {
    async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let url = format!("{}/getUpdates", self.base);
        let reply: GetUpdatesReply = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", LONG_POLL_SECS.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !reply.ok {
            anyhow::bail!("telegram getUpdates replied ok=false");
        }
        Ok(reply.result)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base);
        let response = self
            .http
            .post(&url)
            .json(&SendMessageRequest {
                chat_id,
                text,
                parse_mode: "Markdown",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("telegram sendMessage failed: HTTP {}", response.status());
        }
        Ok(())
    }
}

/// Persistence seam for the last-seen-update cursor; owned state, not a
/// module global.
pub trait CursorStore: Send {
    fn load(&self) -> i64;
    fn save(&mut self, cursor: i64) -> Result<()>;
}

/// Cursor in a small file under ~/.gastobot/
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> i64 {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    fn save(&mut self, cursor: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, cursor.to_string())
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Drop updates already covered by the cursor. Telegram can resend and the
/// cursor file can lag a crash; duplicates are skipped, never an error.
fn fresh_updates(updates: Vec<TelegramUpdate>, cursor: i64) -> Vec<TelegramUpdate> {
    updates.into_iter().filter(|u| u.update_id > cursor).collect()
}

/// Run the bridge until the shutdown signal flips.
pub async fn run(
    pipeline: &mut ChatPipeline,
    transport: &dyn BridgeTransport,
    cursor_store: &mut dyn CursorStore,
    poll_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cursor = cursor_store.load();
    tracing::info!(cursor, "telegram bridge started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match transport.get_updates(cursor + 1).await {
            Ok(updates) => {
                for update in fresh_updates(updates, cursor) {
                    // processed to completion even if shutdown arrives now
                    if let Some(message) = update.message {
                        if let Some(text) = message.text {
                            tracing::info!(update_id = update.update_id, "bridge message");
                            let reply = pipeline.handle_utterance(&text).await;
                            if let Err(e) = transport.send_message(message.chat.id, &reply).await {
                                tracing::warn!(error = %e, "failed to send bridge reply");
                            }
                        }
                    }
                    cursor = update.update_id;
                    if let Err(e) = cursor_store.save(cursor) {
                        tracing::warn!(error = %e, "failed to persist bridge cursor");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "telegram poll failed");
            }
        }

        // fixed inter-poll delay; a shutdown only skips the next cycle
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(poll_delay) => {}
        }
    }

    tracing::info!(cursor, "telegram bridge stopped");
}
