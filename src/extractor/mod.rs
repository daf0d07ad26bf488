//! Conversational intent extraction
//!
//! Turns a free-text utterance into typed operations via Gemini function
//! calling. Every failure at this boundary (transport, bad credential,
//! malformed response, invalid call arguments) is recovered into a
//! user-facing `Text` result; nothing here is fatal to the chat session and
//! nothing malformed ever reaches the reconciler.

mod definitions;
pub mod gemini;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use thiserror::Error;

use crate::expense::Category;
use gemini::RawCall;

pub use definitions::get_declarations;

/// Result of interpreting one utterance
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// One or more actionable operations, in model order
    Calls(Vec<ExpenseCall>),
    /// A direct conversational reply, no operation
    Text(String),
}

/// A validated, strongly typed operation. The model's loose argument maps
/// are rejected at this layer if they fail to validate.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpenseCall {
    Add {
        amount: f64,
        category: Category,
        description: String,
        expense_date: NaiveDate,
    },
    Delete {
        search_query: String,
    },
    History {
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("la IA pidió una operación desconocida: {0}")]
    UnknownOperation(String),
    #[error("la IA devolvió argumentos inválidos para {call}: {detail}")]
    InvalidArgs { call: &'static str, detail: String },
}

/// Validate the model's raw calls into typed operations. All-or-nothing: one
/// bad call rejects the batch, surfaced as an extraction failure.
pub fn validate_calls(raw: &[RawCall]) -> Result<Vec<ExpenseCall>, ExtractError> {
    raw.iter().map(validate_call).collect()
}

fn validate_call(call: &RawCall) -> Result<ExpenseCall, ExtractError> {
    match call.name.as_str() {
        "add_expense" => {
            let amount = require_number(&call.args, "amount", "add_expense")?;
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ExtractError::InvalidArgs {
                    call: "add_expense",
                    detail: format!("el monto debe ser positivo, llegó {}", amount),
                });
            }
            let category =
                Category::from_label_or_otros(require_str(&call.args, "category", "add_expense")?);
            let description = require_str(&call.args, "description", "add_expense")?.to_string();
            let expense_date =
                parse_date(require_str(&call.args, "expenseDate", "add_expense")?, "add_expense")?;
            Ok(ExpenseCall::Add {
                amount,
                category,
                description,
                expense_date,
            })
        }
        "delete_expense" => {
            let query = require_str(&call.args, "searchQuery", "delete_expense")?;
            if query.trim().is_empty() {
                return Err(ExtractError::InvalidArgs {
                    call: "delete_expense",
                    detail: "searchQuery vacío".into(),
                });
            }
            Ok(ExpenseCall::Delete {
                search_query: query.to_string(),
            })
        }
        "get_expenses_history" => {
            let start_date = optional_date(&call.args, "startDate")?;
            let end_date = optional_date(&call.args, "endDate")?;
            Ok(ExpenseCall::History {
                start_date,
                end_date,
            })
        }
        other => Err(ExtractError::UnknownOperation(other.to_string())),
    }
}

fn require_number(args: &Value, field: &str, call: &'static str) -> Result<f64, ExtractError> {
    args.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ExtractError::InvalidArgs {
            call,
            detail: format!("falta el campo numérico '{}'", field),
        })
}

fn require_str<'a>(
    args: &'a Value,
    field: &str,
    call: &'static str,
) -> Result<&'a str, ExtractError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::InvalidArgs {
            call,
            detail: format!("falta el campo '{}'", field),
        })
}

fn parse_date(s: &str, call: &'static str) -> Result<NaiveDate, ExtractError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ExtractError::InvalidArgs {
        call,
        detail: format!("fecha inválida '{}', se espera YYYY-MM-DD", s),
    })
}

fn optional_date(args: &Value, field: &str) -> Result<Option<NaiveDate>, ExtractError> {
    match args.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => parse_date(s, "get_expenses_history").map(Some),
        _ => Ok(None),
    }
}

/// System instruction sent with every request. The model needs the current
/// date to resolve relative expressions ("ayer", "el lunes pasado") and the
/// current month as the default report window.
pub fn system_instruction(user_name: &str, today: NaiveDate) -> String {
    let first_of_month = today.with_day(1).unwrap_or(today);
    format!(
        "Eres GastoBot Argentina. Usuario: {user}. Hoy: {today}.\n\n\
         REGLAS CRÍTICAS:\n\
         1. NO SALUDES. NO DES EXPLICACIONES.\n\
         2. Si preguntan \"¿Cuánto gasté?\", \"Mis gastos\", \"Gastos de hoy\", etc., USA SIEMPRE 'get_expenses_history'.\n\
         3. Si no especifican fecha, asume el mes actual ({first} al {today}).\n\
         4. Si preguntan por un periodo (ej: \"10 días\"), calcula las fechas correctas y llama a la herramienta.\n\
         5. Sé una herramienta, no un amigo. Sé minimalista.\n\
         6. Si el usuario dice algo como \"Gaste 500 en pan\", asume que son pesos argentinos.",
        user = user_name,
        today = today.format("%Y-%m-%d"),
        first = first_of_month.format("%Y-%m-%d"),
    )
}

const FALLBACK_REPLY: &str = "No entendí la solicitud.";

/// Extractor: owns the Gemini client and the recovery policy
pub struct Extractor {
    client: gemini::Client,
}

impl Extractor {
    pub fn new(api_key: String) -> Self {
        Self {
            client: gemini::Client::new(api_key),
        }
    }

    /// Interpret one utterance. Never returns an error: every failure mode
    /// becomes a `Text` diagnostic the chat can show.
    pub async fn interpret(
        &self,
        utterance: &str,
        user_name: &str,
        today: NaiveDate,
    ) -> Interpretation {
        let system = system_instruction(user_name, today);

        let response = match self
            .client
            .generate(utterance, &system, get_declarations())
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "extraction request failed");
                return Interpretation::Text(format!("⚠️ Error de comunicación con la IA: {}", e));
            }
        };

        let raw = response.function_calls();
        if raw.is_empty() {
            return Interpretation::Text(
                response.text().unwrap_or_else(|| FALLBACK_REPLY.to_string()),
            );
        }

        match validate_calls(&raw) {
            Ok(calls) => Interpretation::Calls(calls),
            Err(e) => {
                tracing::warn!(error = %e, "extractor returned invalid calls");
                Interpretation::Text(format!("⚠️ {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(name: &str, args: Value) -> RawCall {
        RawCall {
            name: name.into(),
            args,
        }
    }

    #[test]
    fn validates_well_formed_add() {
        let calls = validate_calls(&[raw(
            "add_expense",
            json!({
                "amount": 500,
                "category": "Restaurantes",
                "description": "pizza",
                "expenseDate": "2024-01-15"
            }),
        )])
        .unwrap();
        assert_eq!(
            calls,
            vec![ExpenseCall::Add {
                amount: 500.0,
                category: Category::Restaurantes,
                description: "pizza".into(),
                expense_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            }]
        );
    }

    #[test]
    fn rejects_add_with_missing_amount() {
        let err = validate_calls(&[raw(
            "add_expense",
            json!({"category": "Ocio", "description": "cine", "expenseDate": "2024-01-15"}),
        )])
        .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidArgs { call: "add_expense", .. }));
    }

    #[test]
    fn rejects_non_positive_amount() {
        let err = validate_calls(&[raw(
            "add_expense",
            json!({
                "amount": -3,
                "category": "Ocio",
                "description": "cine",
                "expenseDate": "2024-01-15"
            }),
        )])
        .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidArgs { .. }));
    }

    #[test]
    fn unknown_category_is_tolerated_as_otros() {
        let calls = validate_calls(&[raw(
            "add_expense",
            json!({
                "amount": 100,
                "category": "Mascotas",
                "description": "alimento",
                "expenseDate": "2024-01-15"
            }),
        )])
        .unwrap();
        assert!(matches!(
            calls[0],
            ExpenseCall::Add { category: Category::Otros, .. }
        ));
    }

    #[test]
    fn rejects_malformed_date() {
        let err = validate_calls(&[raw(
            "add_expense",
            json!({
                "amount": 100,
                "category": "Luz",
                "description": "factura",
                "expenseDate": "15/01/2024"
            }),
        )])
        .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidArgs { .. }));
    }

    #[test]
    fn history_dates_are_optional() {
        let calls = validate_calls(&[raw("get_expenses_history", json!({}))]).unwrap();
        assert_eq!(
            calls,
            vec![ExpenseCall::History {
                start_date: None,
                end_date: None
            }]
        );

        let calls = validate_calls(&[raw(
            "get_expenses_history",
            json!({"startDate": "2024-01-01", "endDate": "2024-01-31"}),
        )])
        .unwrap();
        assert!(matches!(
            calls[0],
            ExpenseCall::History {
                start_date: Some(_),
                end_date: Some(_)
            }
        ));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = validate_calls(&[raw("transfer_funds", json!({}))]).unwrap_err();
        assert_eq!(err, ExtractError::UnknownOperation("transfer_funds".into()));
    }

    #[test]
    fn one_bad_call_rejects_the_batch() {
        let err = validate_calls(&[
            raw("delete_expense", json!({"searchQuery": "pan"})),
            raw("delete_expense", json!({"searchQuery": "  "})),
        ])
        .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidArgs { call: "delete_expense", .. }));
    }

    #[test]
    fn system_instruction_carries_date_and_name() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let prompt = system_instruction("Caro", today);
        assert!(prompt.contains("Usuario: Caro"));
        assert!(prompt.contains("Hoy: 2024-03-15"));
        assert!(prompt.contains("2024-03-01 al 2024-03-15"));
    }
}
