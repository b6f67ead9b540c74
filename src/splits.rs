use crate::config::DEFAULT_SPLIT_TOLERANCE;
use crate::error::{LedgerError, Result};
use crate::normalize::parse_date;
use crate::schema::{RawValue, SplitRole, Transaction};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// Absorbs float noise when comparing sums against a tolerance.
const AMOUNT_EPSILON: f64 = 1e-9;

/// Non-fatal integrity problems found while merging a split log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitDiagnostic {
    /// A source was marked as split but no children exist; the source was kept.
    MissingChildren { group_id: String },
    /// The children do not add up to the source.
    AmountMismatch {
        group_id: String,
        source_amount: f64,
        children_amount: f64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub ledger: Vec<Transaction>,
    pub diagnostics: Vec<SplitDiagnostic>,
}

/// One partition of a source transaction, as entered in the split editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitPart {
    /// Positive magnitude; the side (income/expense) follows the source.
    pub amount: f64,
    pub description: Option<String>,
    pub category: Option<String>,
    pub trip_event: Option<String>,
}

#[derive(Default)]
struct GroupIndex<'a> {
    sources: HashSet<&'a str>,
    reverted: HashSet<&'a str>,
    log_children: HashMap<&'a str, Vec<&'a Transaction>>,
    ledger_children: HashSet<&'a str>,
}

impl<'a> GroupIndex<'a> {
    fn build(raw: &'a [Transaction], split_log: &'a [Transaction]) -> Self {
        let mut index = GroupIndex::default();

        for (record, from_log) in raw
            .iter()
            .map(|r| (r, false))
            .chain(split_log.iter().map(|r| (r, true)))
        {
            let Some(group) = record.split_group_id.as_deref() else {
                continue;
            };
            match record.split_role {
                Some(SplitRole::Source) => {
                    index.sources.insert(group);
                }
                Some(SplitRole::Reverted) => {
                    index.reverted.insert(group);
                }
                Some(SplitRole::Child) if from_log => {
                    index.log_children.entry(group).or_default().push(record);
                }
                Some(SplitRole::Child) => {
                    index.ledger_children.insert(group);
                }
                None => {}
            }
        }

        index
    }

    fn is_active_source(&self, group: &str) -> bool {
        self.sources.contains(group) && !self.reverted.contains(group)
    }
}

/// Replaces split sources in `raw` with their children from `split_log` and
/// returns the working ledger, newest first.
pub fn merge_splits(raw: &[Transaction], split_log: &[Transaction]) -> MergeOutcome {
    merge_splits_with_tolerance(raw, split_log, DEFAULT_SPLIT_TOLERANCE)
}

pub fn merge_splits_with_tolerance(
    raw: &[Transaction],
    split_log: &[Transaction],
    tolerance: f64,
) -> MergeOutcome {
    let index = GroupIndex::build(raw, split_log);
    let mut ledger = Vec::with_capacity(raw.len());
    let mut diagnostics = Vec::new();
    let mut expanded: HashSet<&str> = HashSet::new();

    for record in raw {
        let group = record.split_group_id.as_deref();

        if record.is_split_child() {
            // Children of an undone split are ignored.
            if !group.is_some_and(|g| index.reverted.contains(g)) {
                ledger.push(record.clone());
            }
            continue;
        }

        let Some(group) = group.filter(|g| index.is_active_source(g)) else {
            ledger.push(restore_reverted(record, &index));
            continue;
        };

        if !expanded.insert(group) {
            continue;
        }

        match index.log_children.get(group) {
            Some(children) => {
                check_amounts(group, record, children, tolerance, &mut diagnostics);
                ledger.extend(children.iter().map(|c| (*c).clone()));
            }
            // Already expanded on a previous load.
            None if index.ledger_children.contains(group) => {}
            None => {
                warn!("Split group '{}' has no children; keeping the source record", group);
                diagnostics.push(SplitDiagnostic::MissingChildren {
                    group_id: group.to_string(),
                });
                ledger.push(record.clone());
            }
        }
    }

    sort_newest_first(&mut ledger);

    debug!(
        "Merged {} raw records with {} split log entries into {} working records",
        raw.len(),
        split_log.len(),
        ledger.len()
    );

    MergeOutcome { ledger, diagnostics }
}

// A source of an undone split keeps its group but is marked REVERTED, so a
// later merge without the split log still treats it as unsplit.
fn restore_reverted(record: &Transaction, index: &GroupIndex) -> Transaction {
    let reverted = record.split_role == Some(SplitRole::Source)
        && record
            .split_group_id
            .as_deref()
            .is_some_and(|g| index.reverted.contains(g));

    if reverted {
        Transaction {
            split_role: Some(SplitRole::Reverted),
            ..record.clone()
        }
    } else {
        record.clone()
    }
}

fn check_amounts(
    group: &str,
    source: &Transaction,
    children: &[&Transaction],
    tolerance: f64,
    diagnostics: &mut Vec<SplitDiagnostic>,
) {
    let source_amount = source.net();
    let children_amount: f64 = children.iter().map(|c| c.net()).sum();

    if (source_amount - children_amount).abs() > tolerance + AMOUNT_EPSILON {
        warn!(
            "Split group '{}' children sum to {:.2} but source is {:.2}",
            group, children_amount, source_amount
        );
        diagnostics.push(SplitDiagnostic::AmountMismatch {
            group_id: group.to_string(),
            source_amount,
            children_amount,
        });
    }
}

/// Stable sort by date, newest first. Records with unreadable dates go last.
pub fn sort_newest_first(ledger: &mut [Transaction]) {
    ledger.sort_by(|a, b| parse_date(&b.date).cmp(&parse_date(&a.date)));
}

/// Builds the split-log entries for splitting `source` into `parts`.
///
/// The first entry is the source itself tagged `SOURCE`; the rest are the
/// `CHILD` records. Each child inherits the source's fields unless the part
/// overrides them.
pub fn create_split(
    source: &Transaction,
    group_id: &str,
    parts: &[SplitPart],
    tolerance: f64,
) -> Result<Vec<Transaction>> {
    if parts.is_empty() {
        return Err(LedgerError::EmptySplit(group_id.to_string()));
    }

    let source_net = source.net();
    let source_amount = source_net.abs();
    let children_amount: f64 = parts.iter().map(|p| p.amount.abs()).sum();

    if (source_amount - children_amount).abs() > tolerance + AMOUNT_EPSILON {
        return Err(LedgerError::SplitAmountMismatch {
            group_id: group_id.to_string(),
            source_amount,
            children_amount,
        });
    }

    let is_income = source_net > 0.0;
    let mut entries = Vec::with_capacity(parts.len() + 1);

    entries.push(Transaction {
        split_group_id: Some(group_id.to_string()),
        split_role: Some(SplitRole::Source),
        ..source.clone()
    });

    for part in parts {
        let amount = RawValue::Number(part.amount.abs());
        let (income, expense) = if is_income {
            (amount, RawValue::Empty)
        } else {
            (RawValue::Empty, amount)
        };

        entries.push(Transaction {
            description: part
                .description
                .clone()
                .unwrap_or_else(|| source.description.clone()),
            category: part.category.clone().or_else(|| source.category.clone()),
            trip_event: part.trip_event.clone().or_else(|| source.trip_event.clone()),
            income,
            expense,
            split_group_id: Some(group_id.to_string()),
            split_role: Some(SplitRole::Child),
            ..source.clone()
        });
    }

    Ok(entries)
}

/// Returns a copy of `split_log` with every entry of `group_id` marked
/// `REVERTED`, which restores the source on the next merge.
pub fn revert_split(split_log: &[Transaction], group_id: &str) -> Vec<Transaction> {
    split_log
        .iter()
        .map(|entry| {
            if entry.split_group_id.as_deref() == Some(group_id) {
                Transaction {
                    split_role: Some(SplitRole::Reverted),
                    ..entry.clone()
                }
            } else {
                entry.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(date: &str, description: &str, amount: f64) -> Transaction {
        Transaction {
            date: date.to_string(),
            description: description.to_string(),
            expense: RawValue::Number(amount),
            ..Default::default()
        }
    }

    fn in_group(mut tx: Transaction, group: &str, role: SplitRole) -> Transaction {
        tx.split_group_id = Some(group.to_string());
        tx.split_role = Some(role);
        tx
    }

    #[test]
    fn test_source_replaced_by_children() {
        let raw = vec![in_group(expense("2024-01-10", "Hotel", 100.0), "g1", SplitRole::Source)];
        let log = vec![
            in_group(expense("2024-01-10", "Hotel (A)", 60.0), "g1", SplitRole::Child),
            in_group(expense("2024-01-10", "Hotel (B)", 40.0), "g1", SplitRole::Child),
        ];

        let outcome = merge_splits(&raw, &log);
        assert_eq!(outcome.ledger.len(), 2);
        assert!(outcome.ledger.iter().all(|t| t.is_split_child()));
        let total: f64 = outcome.ledger.iter().map(|t| t.expense_amount()).sum();
        assert!((total - 100.0).abs() < 0.01);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_empty_log_sorts_only() {
        let raw = vec![
            expense("2024-01-01", "a", 1.0),
            expense("2024-03-01", "b", 2.0),
            expense("2024-01-01", "c", 3.0),
            expense("not a date", "d", 4.0),
            expense("2024-02-01", "e", 5.0),
        ];

        let outcome = merge_splits(&raw, &[]);
        let order: Vec<&str> = outcome.ledger.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["b", "e", "a", "c", "d"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let raw = vec![
            expense("2024-01-05", "Groceries", 20.0),
            in_group(expense("2024-01-10", "Hotel", 100.0), "g1", SplitRole::Source),
            in_group(expense("2024-01-12", "Orphan", 30.0), "g2", SplitRole::Source),
        ];
        let log = vec![
            in_group(expense("2024-01-10", "Hotel (A)", 60.0), "g1", SplitRole::Child),
            in_group(expense("2024-01-10", "Hotel (B)", 40.0), "g1", SplitRole::Child),
        ];

        let once = merge_splits(&raw, &log).ledger;
        let twice = merge_splits(&once, &[]).ledger;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_children_keeps_source() {
        let raw = vec![in_group(expense("2024-01-12", "Orphan", 30.0), "g2", SplitRole::Source)];
        let outcome = merge_splits(&raw, &[]);

        assert_eq!(outcome.ledger, raw);
        assert_eq!(
            outcome.diagnostics,
            vec![SplitDiagnostic::MissingChildren {
                group_id: "g2".to_string()
            }]
        );
    }

    #[test]
    fn test_group_expanded_once() {
        let raw = vec![
            in_group(expense("2024-01-10", "Hotel", 100.0), "g1", SplitRole::Source),
            Transaction {
                split_group_id: Some("g1".to_string()),
                ..expense("2024-01-10", "Hotel copy", 100.0)
            },
        ];
        let log = vec![in_group(expense("2024-01-10", "Hotel (all)", 100.0), "g1", SplitRole::Child)];

        let outcome = merge_splits(&raw, &log);
        assert_eq!(outcome.ledger.len(), 1);
        assert_eq!(outcome.ledger[0].description, "Hotel (all)");
    }

    #[test]
    fn test_children_keep_their_own_tags() {
        let mut source = in_group(expense("2024-01-10", "Hotel", 100.0), "g1", SplitRole::Source);
        source.category = Some("Travel".to_string());
        let parts = vec![
            SplitPart {
                amount: 70.0,
                ..Default::default()
            },
            SplitPart {
                amount: 30.0,
                category: Some("Food".to_string()),
                trip_event: Some("Berlin".to_string()),
                ..Default::default()
            },
        ];

        let log = create_split(&source, "g1", &parts, DEFAULT_SPLIT_TOLERANCE).unwrap();
        let outcome = merge_splits(&[source], &log);

        let categories: Vec<Option<&str>> =
            outcome.ledger.iter().map(|t| t.category.as_deref()).collect();
        assert_eq!(categories, vec![Some("Travel"), Some("Food")]);
        assert_eq!(outcome.ledger[1].trip_event.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_reverted_group_restores_source() {
        let source = expense("2024-01-10", "Hotel", 100.0);
        let parts = vec![
            SplitPart {
                amount: 50.0,
                ..Default::default()
            },
            SplitPart {
                amount: 50.0,
                ..Default::default()
            },
        ];
        let log = create_split(&source, "g1", &parts, DEFAULT_SPLIT_TOLERANCE).unwrap();
        let raw = vec![log[0].clone()];

        let reverted = revert_split(&log, "g1");
        assert!(reverted
            .iter()
            .all(|t| t.split_role == Some(SplitRole::Reverted)));
        // The input log is untouched.
        assert_eq!(log[1].split_role, Some(SplitRole::Child));

        let outcome = merge_splits(&raw, &reverted);
        assert_eq!(outcome.ledger.len(), 1);
        assert_eq!(outcome.ledger[0].description, "Hotel");
        assert_eq!(outcome.ledger[0].split_role, Some(SplitRole::Reverted));
        assert!(outcome.diagnostics.is_empty());

        // Reloading the merged ledger alone reports nothing new.
        let reloaded = merge_splits(&outcome.ledger, &[]);
        assert_eq!(reloaded.ledger, outcome.ledger);
        assert!(reloaded.diagnostics.is_empty());
    }

    #[test]
    fn test_unbalanced_children_flagged() {
        let raw = vec![in_group(expense("2024-01-10", "Hotel", 100.0), "g1", SplitRole::Source)];
        let log = vec![in_group(expense("2024-01-10", "Hotel (A)", 60.0), "g1", SplitRole::Child)];

        let outcome = merge_splits(&raw, &log);
        assert_eq!(outcome.ledger.len(), 1);
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [SplitDiagnostic::AmountMismatch { .. }]
        ));
    }

    #[test]
    fn test_create_split_rejects_bad_sums() {
        let source = expense("2024-01-10", "Hotel", 100.0);
        let parts = vec![SplitPart {
            amount: 99.0,
            ..Default::default()
        }];
        let result = create_split(&source, "g1", &parts, DEFAULT_SPLIT_TOLERANCE);
        assert!(matches!(result, Err(LedgerError::SplitAmountMismatch { .. })));

        let result = create_split(&source, "g1", &[], DEFAULT_SPLIT_TOLERANCE);
        assert!(matches!(result, Err(LedgerError::EmptySplit(_))));
    }

    #[test]
    fn test_create_split_within_tolerance() {
        let source = expense("2024-01-10", "Dinner", 10.0);
        let parts = vec![
            SplitPart {
                amount: 3.33,
                ..Default::default()
            },
            SplitPart {
                amount: 3.33,
                ..Default::default()
            },
            SplitPart {
                amount: 3.33,
                ..Default::default()
            },
        ];
        let log = create_split(&source, "g9", &parts, DEFAULT_SPLIT_TOLERANCE).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].split_role, Some(SplitRole::Source));
        assert!(log[1..].iter().all(|t| t.expense_amount() == 3.33));
    }
}
