//! GastoBot - chat-driven expense tracking for Argentina
//!
//! Free-text expense statements go to Gemini configured with three callable
//! operations (add, delete, history); the structured calls come back through
//! a business-rule reconciler that mirrors results to a user-supplied
//! Google-Sheets-style HTTP ledger. Local state is the source of truth; the
//! sheet is a best-effort mirror.

pub mod bridge;
pub mod config;
pub mod expense;
pub mod extractor;
pub mod ledger;
pub mod pipeline;
pub mod reconciler;
pub mod repl;
pub mod state;
pub mod store;

pub use expense::{Category, ChatMessage, Expense, Sender};
pub use extractor::{ExpenseCall, Extractor, Interpretation};
pub use ledger::{Ledger, LedgerError, SheetsLedger};
pub use pipeline::ChatPipeline;
pub use reconciler::{reconcile, Outcome, SyncPolicy};
