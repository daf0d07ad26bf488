//! Chat pipeline: one utterance in, exactly one bot message out
//!
//! Glue between the extractor, the reconciler and local state. Whatever
//! happens downstream (model unreachable, sheet misconfigured, nothing
//! matched) the user always gets a reply; nothing here panics or surfaces a
//! raw error.

use std::path::PathBuf;

use chrono::Local;

use crate::expense::{Expense, Sender};
use crate::extractor::{ExpenseCall, Extractor, Interpretation};
use crate::ledger::Ledger;
use crate::reconciler::reconcile;
use crate::state;
use crate::store::{ChatTranscript, ExpenseStore};

pub const GREETING: &str = "¡Hola! Soy GastoBot Argentina 🇦🇷\n\n\
    Podés decirme \"Gaste 5000 en pizza hoy\" o \"Ayer gasté 3000 en taxi\".\n\n\
    ⚠️ Si no me decís fecha, anoto para hoy.";

pub struct ChatPipeline {
    extractor: Extractor,
    ledger: Option<Box<dyn Ledger>>,
    user_name: String,
    state_path: Option<PathBuf>,
    pub store: ExpenseStore,
    pub transcript: ChatTranscript,
}

impl ChatPipeline {
    pub fn new(extractor: Extractor, user_name: impl Into<String>) -> Self {
        Self {
            extractor,
            ledger: None,
            user_name: user_name.into(),
            state_path: None,
            store: ExpenseStore::new(),
            transcript: ChatTranscript::new(),
        }
    }

    pub fn with_ledger(mut self, ledger: Box<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Persist the expense list here after every mutation.
    pub fn with_state_path(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    /// Seed the store (initial ledger sync or the persisted file).
    pub fn with_expenses(mut self, expenses: Vec<Expense>) -> Self {
        self.store.replace_all(expenses);
        self
    }

    /// Append and return the greeting message.
    pub fn greet(&mut self) -> String {
        self.transcript.push(GREETING, Sender::Bot);
        GREETING.to_string()
    }

    /// Process one user utterance end to end and return the bot reply.
    pub async fn handle_utterance(&mut self, text: &str) -> String {
        self.transcript.push(text, Sender::User);

        let today = Local::now().date_naive();
        let reply = match self.extractor.interpret(text, &self.user_name, today).await {
            Interpretation::Text(text) => text,
            Interpretation::Calls(calls) => self.apply_calls(&calls).await,
        };

        self.transcript.push(reply.as_str(), Sender::Bot);
        reply
    }

    /// Reconcile validated calls and apply the outcome to local state.
    pub async fn apply_calls(&mut self, calls: &[ExpenseCall]) -> String {
        let outcome = reconcile(calls, self.store.all(), self.ledger.as_deref()).await;

        let mutated = !outcome.to_add.is_empty() || !outcome.to_remove.is_empty();
        for expense in outcome.to_add {
            self.store.add(expense);
        }
        for id in &outcome.to_remove {
            self.store.remove(id);
        }

        if mutated {
            if let Some(path) = &self.state_path {
                if let Err(e) = state::save_expenses(path, self.store.all()) {
                    tracing::warn!(error = %e, "failed to persist expense state");
                }
            }
        }

        outcome.response_text
    }
}
