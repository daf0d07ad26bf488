//! Intent reconciler: executes structured calls against local and remote state
//!
//! Calls from one utterance are processed strictly in order; response
//! fragments accumulate and are joined with a blank line into the single bot
//! reply. Queued adds are coalesced into one bulk remote write issued after
//! the per-call loop, so the request count stays bounded no matter how many
//! purchases one message mentions.
//!
//! Sync asymmetry is deliberate policy, not an accident: adds hit local
//! state even when the remote write fails (chat availability over write
//! durability), deletes touch local state only after the remote confirms.

use chrono::NaiveDate;

use crate::expense::{amount_key, format_ars, Expense};
use crate::extractor::ExpenseCall;
use crate::ledger::Ledger;

/// Named sync policy per mutation kind, so tests can target each side of the
/// asymmetry explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Local mutation applied regardless of remote outcome.
    OptimisticOnAdd,
    /// Local mutation applied only after the remote confirms.
    ConfirmedOnDelete,
}

impl SyncPolicy {
    pub fn for_call(call: &ExpenseCall) -> Option<SyncPolicy> {
        match call {
            ExpenseCall::Add { .. } => Some(SyncPolicy::OptimisticOnAdd),
            ExpenseCall::Delete { .. } => Some(SyncPolicy::ConfirmedOnDelete),
            // pure read
            ExpenseCall::History { .. } => None,
        }
    }
}

/// Result of reconciling one utterance's calls
#[derive(Debug)]
pub struct Outcome {
    /// Combined human-readable reply (blank-line separated fragments)
    pub response_text: String,
    /// New records to prepend locally, in call order
    pub to_add: Vec<Expense>,
    /// Ids whose local removal was confirmed
    pub to_remove: Vec<String>,
}

const NO_EXPENSES_IN_PERIOD: &str = "No hay gastos registrados en este periodo.";

/// ARS magnitude heuristic: users type abbreviated amounts ("5" meaning
/// 5000) in a high-inflation currency, so whole amounts under 1000 are
/// scaled up. Deliberately lossy: there is no way to log a literal $500
/// as an integer.
pub fn normalize_amount(amount: f64) -> f64 {
    if amount > 0.0 && amount.fract() == 0.0 && amount < 1000.0 {
        amount * 1000.0
    } else {
        amount
    }
}

/// First expense matching the delete query over the list's existing order
/// (newest first). Description substring match, case-insensitive, OR exact
/// decimal-string amount match.
pub fn match_for_deletion<'a>(
    query: &str,
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Option<&'a Expense> {
    let query = query.to_lowercase();
    expenses.into_iter().find(|e| {
        e.description.to_lowercase().contains(&query) || amount_key(e.amount) == query
    })
}

/// Inclusive date-range report over the local list. Pure read.
fn history_report(local: &[Expense], start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    let mut filtered: Vec<&Expense> = local
        .iter()
        .filter(|e| start.map_or(true, |s| e.expense_date >= s))
        .filter(|e| end.map_or(true, |t| e.expense_date <= t))
        .collect();

    if filtered.is_empty() {
        return NO_EXPENSES_IN_PERIOD.to_string();
    }

    // stable: ties keep their original (newest-first) relative order
    filtered.sort_by(|a, b| b.expense_date.cmp(&a.expense_date));

    let total: f64 = filtered.iter().map(|e| e.amount).sum();
    let lines: Vec<String> = filtered
        .iter()
        .map(|e| {
            format!(
                "• {} - {}: **${}**",
                e.expense_date.format("%d/%m"),
                e.description,
                format_ars(e.amount)
            )
        })
        .collect();

    format!("{}\n\n💰 **TOTAL: ${}**", lines.join("\n"), format_ars(total))
}

/// Execute the calls in order against the current local list, driving the
/// remote ledger when one is configured. Without a ledger the bot runs in
/// local-only mode and every mutation is trivially confirmed.
pub async fn reconcile(
    calls: &[ExpenseCall],
    local: &[Expense],
    ledger: Option<&dyn Ledger>,
) -> Outcome {
    let mut fragments: Vec<String> = Vec::new();
    let mut to_add: Vec<Expense> = Vec::new();
    let mut to_remove: Vec<String> = Vec::new();

    for call in calls {
        match call {
            ExpenseCall::Add {
                amount,
                category,
                description,
                expense_date,
            } => {
                let amount = normalize_amount(*amount);
                to_add.push(Expense::new(amount, *category, description.clone(), *expense_date));
            }

            ExpenseCall::Delete { search_query } => {
                let query = search_query.to_lowercase();
                // entries claimed by an earlier delete in this batch are gone
                let target = match_for_deletion(
                    &query,
                    local.iter().filter(|e| !to_remove.contains(&e.id)),
                );

                let Some(target) = target else {
                    fragments.push(format!("No encontré nada con \"{}\".", query));
                    continue;
                };

                let confirmed = match ledger {
                    Some(l) => l.delete(&target.id).await,
                    None => Ok(()),
                };
                match confirmed {
                    Ok(()) => {
                        tracing::debug!(
                            id = %target.id,
                            policy = ?SyncPolicy::ConfirmedOnDelete,
                            "remote delete confirmed"
                        );
                        to_remove.push(target.id.clone());
                        fragments.push(format!(
                            "🗑️ Borré: **{}** (${}).",
                            target.description,
                            format_ars(target.amount)
                        ));
                    }
                    Err(e) => {
                        // no local removal without remote confirmation
                        fragments.push(format!("⚠️ Error al borrar en la planilla: {}", e));
                    }
                }
            }

            ExpenseCall::History {
                start_date,
                end_date,
            } => {
                fragments.push(history_report(local, *start_date, *end_date));
            }
        }
    }

    if !to_add.is_empty() {
        let total: f64 = to_add.iter().map(|e| e.amount).sum();
        let remote = match ledger {
            Some(l) => l.bulk_add(&to_add).await,
            None => Ok(()),
        };
        match remote {
            Ok(()) => {
                fragments.push(format!("✅ Registrado: **${}**.", format_ars(total)));
            }
            Err(e) => {
                // adds stay queued locally: availability over durability
                tracing::warn!(
                    error = %e,
                    policy = ?SyncPolicy::OptimisticOnAdd,
                    "bulk add failed, keeping local additions"
                );
                fragments.push(format!("⚠️ Error al guardar en la planilla: {}", e));
            }
        }
    }

    Outcome {
        response_text: fragments.join("\n\n"),
        to_add,
        to_remove,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::Category;
    use crate::ledger::LedgerError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fake sheet endpoint recording every call
    #[derive(Default)]
    struct MockLedger {
        fail_bulk: bool,
        fail_delete: bool,
        bulk_calls: Mutex<Vec<usize>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Ledger for MockLedger {
        async fn list(&self) -> Result<Vec<Expense>, LedgerError> {
            Ok(Vec::new())
        }

        async fn bulk_add(&self, expenses: &[Expense]) -> Result<(), LedgerError> {
            self.bulk_calls.lock().unwrap().push(expenses.len());
            if self.fail_bulk {
                Err(LedgerError::Remote("cuota excedida".into()))
            } else {
                Ok(())
            }
        }

        async fn delete(&self, id: &str) -> Result<(), LedgerError> {
            if self.fail_delete {
                return Err(LedgerError::NotFound);
            }
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn expense(desc: &str, amount: f64, day: &str) -> Expense {
        Expense::new(amount, Category::Otros, desc, date(day))
    }

    fn add_call(amount: f64) -> ExpenseCall {
        ExpenseCall::Add {
            amount,
            category: Category::Otros,
            description: "algo".into(),
            expense_date: date("2024-01-10"),
        }
    }

    #[test]
    fn magnitude_heuristic() {
        assert_eq!(normalize_amount(5.0), 5000.0);
        assert_eq!(normalize_amount(999.0), 999000.0);
        assert_eq!(normalize_amount(1000.0), 1000.0);
        assert_eq!(normalize_amount(1500.0), 1500.0);
        assert_eq!(normalize_amount(99.5), 99.5);
    }

    #[test]
    fn delete_match_precedence() {
        let expenses = vec![expense("Coffee", 500.0, "2024-01-10"), expense("Bus", 200.0, "2024-01-09")];

        // amount match when no description contains the digits
        let hit = match_for_deletion("200", &expenses).unwrap();
        assert_eq!(hit.description, "Bus");

        // case-insensitive substring match
        let hit = match_for_deletion("cof", &expenses).unwrap();
        assert_eq!(hit.description, "Coffee");

        assert!(match_for_deletion("inexistente", &expenses).is_none());
    }

    #[test]
    fn delete_matches_newest_first() {
        // both match "super"; store order is newest first
        let expenses = vec![
            expense("super chino", 8000.0, "2024-01-12"),
            expense("super coto", 9000.0, "2024-01-02"),
        ];
        let hit = match_for_deletion("super", &expenses).unwrap();
        assert_eq!(hit.description, "super chino");
    }

    #[tokio::test]
    async fn multi_add_yields_one_bulk_write() {
        let ledger = MockLedger::default();
        let calls = vec![add_call(10.0), add_call(20.0), add_call(30.0)];

        let outcome = reconcile(&calls, &[], Some(&ledger)).await;

        assert_eq!(outcome.to_add.len(), 3);
        assert_eq!(*ledger.bulk_calls.lock().unwrap(), vec![3]);
        // heuristic applied before batching: 10+20+30 → 60.000
        assert!(outcome.response_text.contains("✅ Registrado: **$60.000**."));
    }

    #[tokio::test]
    async fn bulk_failure_keeps_local_adds() {
        let ledger = MockLedger {
            fail_bulk: true,
            ..Default::default()
        };
        let outcome = reconcile(&[add_call(5.0)], &[], Some(&ledger)).await;

        assert_eq!(outcome.to_add.len(), 1);
        assert_eq!(outcome.to_add[0].amount, 5000.0);
        assert!(outcome
            .response_text
            .contains("⚠️ Error al guardar en la planilla:"));
    }

    #[tokio::test]
    async fn delete_needs_remote_confirmation() {
        let ledger = MockLedger {
            fail_delete: true,
            ..Default::default()
        };
        let local = vec![expense("pizza", 5000.0, "2024-01-10")];
        let calls = vec![ExpenseCall::Delete {
            search_query: "pizza".into(),
        }];

        let outcome = reconcile(&calls, &local, Some(&ledger)).await;

        assert!(outcome.to_remove.is_empty());
        assert!(outcome
            .response_text
            .contains("⚠️ Error al borrar en la planilla:"));
    }

    #[tokio::test]
    async fn confirmed_delete_removes_and_reports() {
        let ledger = MockLedger::default();
        let local = vec![expense("pizza", 5000.0, "2024-01-10")];
        let calls = vec![ExpenseCall::Delete {
            search_query: "PIZZA".into(),
        }];

        let outcome = reconcile(&calls, &local, Some(&ledger)).await;

        assert_eq!(outcome.to_remove, vec![local[0].id.clone()]);
        assert_eq!(*ledger.deleted.lock().unwrap(), vec![local[0].id.clone()]);
        assert!(outcome.response_text.contains("🗑️ Borré: **pizza** ($5.000)."));
    }

    #[tokio::test]
    async fn delete_without_ledger_is_local_only() {
        let local = vec![expense("pan", 1500.0, "2024-01-10")];
        let calls = vec![ExpenseCall::Delete {
            search_query: "pan".into(),
        }];

        let outcome = reconcile(&calls, &local, None).await;
        assert_eq!(outcome.to_remove.len(), 1);
    }

    #[tokio::test]
    async fn delete_no_match_reports_not_found() {
        let calls = vec![ExpenseCall::Delete {
            search_query: "Sushi".into(),
        }];
        let outcome = reconcile(&calls, &[], None).await;

        assert!(outcome.to_remove.is_empty());
        // query echoed back lowercased
        assert!(outcome.response_text.contains("No encontré nada con \"sushi\"."));
    }

    #[tokio::test]
    async fn history_filter_is_inclusive_on_both_ends() {
        let local: Vec<Expense> = (1..=31)
            .map(|d| expense(&format!("día {}", d), 100.0, &format!("2024-01-{:02}", d)))
            .collect();
        let calls = vec![ExpenseCall::History {
            start_date: Some(date("2024-01-15")),
            end_date: Some(date("2024-01-20")),
        }];

        let outcome = reconcile(&calls, &local, None).await;

        for d in 15..=20 {
            assert!(outcome.response_text.contains(&format!("día {}", d)));
        }
        assert!(!outcome.response_text.contains("día 14"));
        assert!(!outcome.response_text.contains("día 21"));
        // 6 days x 100
        assert!(outcome.response_text.contains("💰 **TOTAL: $600**"));
    }

    #[tokio::test]
    async fn history_sorts_descending_with_total() {
        let local = vec![
            expense("viejo", 100.0, "2024-01-05"),
            expense("nuevo", 200.0, "2024-01-10"),
        ];
        let calls = vec![ExpenseCall::History {
            start_date: None,
            end_date: None,
        }];

        let outcome = reconcile(&calls, &local, None).await;

        let nuevo = outcome.response_text.find("nuevo").unwrap();
        let viejo = outcome.response_text.find("viejo").unwrap();
        assert!(nuevo < viejo);
        assert!(outcome.response_text.contains("• 10/01 - nuevo: **$200**"));
        assert!(outcome.response_text.contains("💰 **TOTAL: $300**"));
    }

    #[tokio::test]
    async fn empty_history_uses_fixed_message() {
        let calls = vec![ExpenseCall::History {
            start_date: Some(date("2030-01-01")),
            end_date: None,
        }];
        let outcome = reconcile(&calls, &[], None).await;
        assert_eq!(outcome.response_text, NO_EXPENSES_IN_PERIOD);
    }

    #[tokio::test]
    async fn history_is_a_pure_read() {
        let local = vec![expense("pan", 1500.0, "2024-01-10")];
        let calls = vec![ExpenseCall::History {
            start_date: None,
            end_date: None,
        }];
        let ledger = MockLedger::default();

        let outcome = reconcile(&calls, &local, Some(&ledger)).await;

        assert!(outcome.to_add.is_empty());
        assert!(outcome.to_remove.is_empty());
        assert!(ledger.bulk_calls.lock().unwrap().is_empty());
        assert!(ledger.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fragments_join_with_blank_line() {
        let local = vec![expense("pan", 1500.0, "2024-01-10")];
        let calls = vec![
            ExpenseCall::Delete {
                search_query: "pan".into(),
            },
            add_call(7.0),
        ];

        let outcome = reconcile(&calls, &local, None).await;
        let parts: Vec<&str> = outcome.response_text.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("🗑️"));
        assert!(parts[1].starts_with("✅"));
    }

    #[test]
    fn sync_policy_mapping() {
        assert_eq!(
            SyncPolicy::for_call(&add_call(1.0)),
            Some(SyncPolicy::OptimisticOnAdd)
        );
        assert_eq!(
            SyncPolicy::for_call(&ExpenseCall::Delete {
                search_query: "x".into()
            }),
            Some(SyncPolicy::ConfirmedOnDelete)
        );
        assert_eq!(
            SyncPolicy::for_call(&ExpenseCall::History {
                start_date: None,
                end_date: None
            }),
            None
        );
    }
}
