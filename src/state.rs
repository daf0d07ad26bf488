//! Persisted client state under ~/.gastobot/
//!
//! The browser original kept everything in localStorage; here the expense
//! list lives in a JSON file written after every mutation, and the Telegram
//! cursor in its own small file (see bridge::FileCursorStore).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::expense::Expense;

/// Directory holding config, state and history files.
pub fn data_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".gastobot")
}

/// Default location of the persisted expense list.
pub fn expenses_path() -> PathBuf {
    data_dir().join("expenses.json")
}

/// Load the persisted expense list. A missing file is an empty list; a
/// corrupt file is reported, not silently discarded.
pub fn load_expenses(path: &Path) -> Result<Vec<Expense>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Write the full expense list, creating the parent directory if needed.
pub fn save_expenses(path: &Path, expenses: &[Expense]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(expenses)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::Category;
    use chrono::NaiveDate;

    #[test]
    fn missing_file_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.json");
        assert!(load_expenses(&path).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("expenses.json");

        let expenses = vec![Expense::new(
            12500.0,
            Category::Transporte,
            "taxi al centro",
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        )];
        save_expenses(&path, &expenses).unwrap();

        let loaded = load_expenses(&path).unwrap();
        assert_eq!(loaded, expenses);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_expenses(&path).is_err());
    }
}
