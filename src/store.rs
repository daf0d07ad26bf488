//! In-memory expense store and chat transcript
//!
//! Single-writer discipline: only the pipeline currently processing an
//! utterance mutates these, and only one utterance is in flight at a time
//! (REPL mode or bridge mode, never both). No locking needed.

use crate::expense::{ChatMessage, Expense, Sender};

/// Ordered collection of expense records, newest first.
///
/// Newest-first is a user-facing invariant: history views list recent
/// transactions first and delete queries match the most recent entry first.
#[derive(Debug, Default)]
pub struct ExpenseStore {
    expenses: Vec<Expense>,
}

impl ExpenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store wholesale, e.g. from an initial ledger sync or the
    /// persisted state file. Input is assumed already newest-first.
    pub fn replace_all(&mut self, expenses: Vec<Expense>) {
        self.expenses = expenses;
    }

    /// Prepend a record.
    pub fn add(&mut self, expense: Expense) {
        self.expenses.insert(0, expense);
    }

    /// Remove by id. A missing id is a no-op, not an error.
    pub fn remove(&mut self, id: &str) {
        self.expenses.retain(|e| e.id != id);
    }

    /// Read-only snapshot in store order.
    pub fn all(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }
}

/// Append-only conversation log. Insertion order is the only ordering
/// guarantee; messages are never reordered by timestamp.
#[derive(Debug, Default)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>, sender: Sender) -> &ChatMessage {
        self.messages.push(ChatMessage::new(text, sender));
        self.messages.last().unwrap()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::Category;
    use chrono::NaiveDate;

    fn sample(desc: &str, amount: f64) -> Expense {
        Expense::new(
            amount,
            Category::Otros,
            desc,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        )
    }

    #[test]
    fn add_prepends_newest_first() {
        let mut store = ExpenseStore::new();
        store.add(sample("first", 100.0));
        store.add(sample("second", 200.0));
        assert_eq!(store.all()[0].description, "second");
        assert_eq!(store.all()[1].description, "first");
    }

    #[test]
    fn remove_absent_id_is_noop() {
        let mut store = ExpenseStore::new();
        store.add(sample("only", 100.0));
        store.remove("no-such-id");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repeated_adds_have_unique_ids() {
        let mut store = ExpenseStore::new();
        for _ in 0..50 {
            store.add(sample("x", 1.0));
        }
        let mut ids: Vec<&str> = store.all().iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn transcript_preserves_insertion_order() {
        let mut t = ChatTranscript::new();
        t.push("hola", Sender::User);
        t.push("¡Hola!", Sender::Bot);
        t.push("gasté 500 en pan", Sender::User);
        let senders: Vec<Sender> = t.messages().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::Bot, Sender::User]);
    }
}
