//! Function declarations for Gemini function calling
//!
//! Exactly three operations: register an expense, delete one by fuzzy query,
//! query history over an optional date range. The category enum offered to
//! the model comes straight from `expense::Category` so the declared
//! vocabulary can never drift from what the reconciler stores.

use serde_json::json;

use super::gemini::FunctionDeclaration;
use crate::expense::Category;

/// All declarations sent with every extraction request
pub fn get_declarations() -> Vec<FunctionDeclaration> {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();

    vec![
        FunctionDeclaration {
            name: "add_expense".into(),
            description: "Registra un nuevo gasto.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "amount": {
                        "type": "number",
                        "description": "Monto en pesos"
                    },
                    "category": {
                        "type": "string",
                        "description": "Categoría del gasto",
                        "enum": categories
                    },
                    "description": {
                        "type": "string",
                        "description": "Descripción breve"
                    },
                    "expenseDate": {
                        "type": "string",
                        "description": "Fecha YYYY-MM-DD"
                    }
                },
                "required": ["amount", "category", "description", "expenseDate"]
            }),
        },
        FunctionDeclaration {
            name: "delete_expense".into(),
            description: "Borra un gasto.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "searchQuery": {
                        "type": "string",
                        "description": "Nombre o monto"
                    }
                },
                "required": ["searchQuery"]
            }),
        },
        FunctionDeclaration {
            name: "get_expenses_history".into(),
            description: "Consulta historial para reportes.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "startDate": {
                        "type": "string",
                        "description": "Inicio YYYY-MM-DD"
                    },
                    "endDate": {
                        "type": "string",
                        "description": "Fin YYYY-MM-DD"
                    },
                    "filterDescription": {
                        "type": "string",
                        "description": "Contexto de la consulta"
                    }
                }
            }),
        },
    ]
}
