//! Core data model: expenses, categories, chat messages
//!
//! The category set is the single source of truth shared by the extractor's
//! declared tool vocabulary and the reconciler. Keep them in sync by never
//! defining category strings anywhere else.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of expense categories (Argentine household vocabulary).
///
/// `Otros` is the declared catch-all: labels from the model that fall outside
/// the set are tolerated by mapping them here instead of rejecting the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Luz,
    Agua,
    Internet,
    Hipoteca,
    Alquiler,
    #[serde(rename = "Teléfono")]
    Telefono,
    #[serde(rename = "Servicio Doméstico")]
    ServicioDomestico,
    Ocio,
    Restaurantes,
    Transporte,
    Otros,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Luz,
        Category::Agua,
        Category::Internet,
        Category::Hipoteca,
        Category::Alquiler,
        Category::Telefono,
        Category::ServicioDomestico,
        Category::Ocio,
        Category::Restaurantes,
        Category::Transporte,
        Category::Otros,
    ];

    /// Wire/display label (Spanish, accented).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Luz => "Luz",
            Category::Agua => "Agua",
            Category::Internet => "Internet",
            Category::Hipoteca => "Hipoteca",
            Category::Alquiler => "Alquiler",
            Category::Telefono => "Teléfono",
            Category::ServicioDomestico => "Servicio Doméstico",
            Category::Ocio => "Ocio",
            Category::Restaurantes => "Restaurantes",
            Category::Transporte => "Transporte",
            Category::Otros => "Otros",
        }
    }

    /// Exact label lookup.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == label)
    }

    /// Lookup that tolerates out-of-vocabulary labels from the model by
    /// falling back to the catch-all.
    pub fn from_label_or_otros(label: &str) -> Category {
        match Category::from_label(label) {
            Some(c) => c,
            None => {
                tracing::warn!(label, "unknown category from extractor, storing as Otros");
                Category::Otros
            }
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown labels coming back from the remote ledger must not poison a whole
// list() response, so deserialization shares the Otros fallback.
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Category::from_label_or_otros(&label))
    }
}

/// A single financial transaction record.
///
/// `expense_date` is when the expense happened; `entry_date` is when it was
/// recorded. Records are never updated in place (a correction is a delete
/// followed by an add).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub category: Category,
    pub description: String,
    pub expense_date: NaiveDate,
    pub entry_date: DateTime<Utc>,
}

impl Expense {
    /// Build a new record with a fresh id and an entry date of now.
    pub fn new(
        amount: f64,
        category: Category,
        description: impl Into<String>,
        expense_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            amount,
            category,
            description: description.into(),
            expense_date,
            entry_date: Utc::now(),
        }
    }
}

/// Who authored a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One line of the conversation transcript. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Shortest decimal rendering of an amount: `500`, not `500.0`.
///
/// Delete queries match against this exact string, so it must agree with how
/// users type amounts in chat.
pub fn amount_key(amount: f64) -> String {
    format!("{}", amount)
}

/// es-AR currency grouping: thousands with `.`, decimals with `,`.
pub fn format_ars(amount: f64) -> String {
    let raw = format!("{}", amount);
    let (sign, raw) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*ch);
    }

    match frac_part {
        Some(f) => format!("{}{},{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
