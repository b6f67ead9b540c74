//! # Treasury Ledger
//!
//! Reconciliation and analytics engine for a treasury ledger kept in a
//! spreadsheet. It turns raw bank-statement rows and the stored ledger into a
//! trustworthy working ledger, and derives balances and chart series from it.
//!
//! ## Core Concepts
//!
//! - **Normalization**: dates and amounts arrive in several spellings and are
//!   compared in one canonical form
//! - **Fingerprint**: composite key deciding whether two rows are the same event
//! - **Split Group**: a source transaction replaced by child transactions that
//!   partition its amount
//! - **Manual Transaction**: backdated history, counted in totals but not twice
//!   in the balance
//! - **Working Ledger**: the ledger after split consolidation, the only input
//!   to balances and charts
//!
//! The engine performs no I/O and owns no storage; every function works on
//! in-memory records and returns new ones.
//!
//! ## Example
//!
//! ```rust,ignore
//! use treasury_ledger::*;
//!
//! let config = LedgerConfig { opening_balance: 100.0, ..Default::default() };
//! let report = LedgerProcessor::process(&config, &raw_ledger, &split_log)?;
//!
//! let chart = aggregate(
//!     &report.working_ledger,
//!     &AggregationOptions {
//!         metric: Metric::Balance,
//!         opening_balance: report.financials.adjusted_opening_balance,
//!         ..Default::default()
//!     },
//! )?;
//! ```

pub mod aggregate;
pub mod balance;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod normalize;
pub mod schema;
pub mod splits;
pub mod state;
pub mod tags;
pub mod utils;

pub use aggregate::{
    aggregate, aggregate_with_tags, AggregationOptions, ChartData, Dimension, Metric, Series,
};
pub use balance::{compute_financials, BalanceEngine, Financials};
pub use config::{LedgerConfig, TimeUnit, UNCATEGORIZED};
pub use dedup::{find_unique, Fingerprint};
pub use error::{LedgerError, Result};
pub use filter::{filter_transactions, TransactionFilter};
pub use ingestion::{import_statement, ImportOutcome};
pub use normalize::{normalize_date, normalize_value, parse_amount};
pub use schema::*;
pub use splits::{create_split, merge_splits, revert_split, MergeOutcome, SplitDiagnostic, SplitPart};
pub use state::{LedgerStore, StateStore, SubscriptionHandle};
pub use tags::{apply_ops_to_ledger, apply_pending_ops, TagMaps, TagOperation, TripStatus};

use log::{debug, info};
use serde::Serialize;

/// Everything the load path derives from the stored ledger.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReport {
    pub working_ledger: Vec<Transaction>,
    pub diagnostics: Vec<SplitDiagnostic>,
    pub financials: Financials,
}

pub struct LedgerProcessor;

impl LedgerProcessor {
    pub fn process(
        config: &LedgerConfig,
        raw_ledger: &[Transaction],
        split_log: &[Transaction],
    ) -> Result<LedgerReport> {
        config.validate()?;

        info!(
            "Processing ledger: {} raw records, {} split log entries",
            raw_ledger.len(),
            split_log.len()
        );

        let outcome =
            splits::merge_splits_with_tolerance(raw_ledger, split_log, config.split_tolerance);
        let financials = compute_financials(config.opening_balance, &outcome.ledger);

        for diagnostic in &outcome.diagnostics {
            debug!("Split integrity: {:?}", diagnostic);
        }

        Ok(LedgerReport {
            working_ledger: outcome.ledger,
            diagnostics: outcome.diagnostics,
            financials,
        })
    }

    /// Charts the working ledger, seeding balance charts from the adjusted
    /// opening balance. Unset options fall back to the config.
    pub fn chart(
        config: &LedgerConfig,
        report: &LedgerReport,
        filter: &TransactionFilter,
        options: &AggregationOptions,
        tags: &TagMaps,
    ) -> Result<ChartData> {
        let options = AggregationOptions {
            time_unit: options.time_unit.or(Some(config.default_time_unit)),
            opening_balance: report.financials.adjusted_opening_balance,
            uncategorized_label: config.uncategorized_label.clone(),
            ..options.clone()
        };

        // The running balance must see history outside the filter's dates.
        let selected = if options.metric == Metric::Balance {
            let undated = TransactionFilter {
                start: None,
                end: filter.end,
                ..filter.clone()
            };
            filter_transactions(&report.working_ledger, &undated, tags)
        } else {
            filter_transactions(&report.working_ledger, filter, tags)
        };

        aggregate_with_tags(&selected, &options, tags)
    }
}

pub fn process_ledger(
    config: &LedgerConfig,
    raw_ledger: &[Transaction],
    split_log: &[Transaction],
) -> Result<LedgerReport> {
    LedgerProcessor::process(config, raw_ledger, split_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(date: &str, income: f64, expense: f64) -> Transaction {
        Transaction {
            date: date.to_string(),
            income: RawValue::Number(income),
            expense: RawValue::Number(expense),
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_processing() {
        let config = LedgerConfig {
            opening_balance: 100.0,
            ..Default::default()
        };
        let raw = vec![
            Transaction {
                kind: Some(TransactionKind::Manual),
                ..row("2024-01-01", 50.0, 0.0)
            },
            row("2024-02-01", 0.0, 20.0),
        ];

        let report = process_ledger(&config, &raw, &[]).unwrap();
        assert_eq!(report.working_ledger[0].date, "2024-02-01");
        assert_eq!(report.financials.manual_offset, -50.0);
        assert_eq!(report.financials.adjusted_opening_balance, 50.0);
        assert_eq!(report.financials.current_balance, 80.0);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_balance_chart_keeps_history_outside_filter() {
        let config = LedgerConfig {
            opening_balance: 10.0,
            ..Default::default()
        };
        let raw = vec![
            row("2024-01-05", 40.0, 0.0),
            row("2024-02-05", 0.0, 15.0),
            row("2024-03-05", 5.0, 0.0),
        ];
        let report = process_ledger(&config, &raw, &[]).unwrap();

        let filter = TransactionFilter::for_period("2024-02:2024-03").unwrap();
        let options = AggregationOptions {
            metric: Metric::Balance,
            window_start: filter.start,
            ..Default::default()
        };
        let chart =
            LedgerProcessor::chart(&config, &report, &filter, &options, &TagMaps::default())
                .unwrap();

        assert_eq!(chart.labels, vec!["2024-02", "2024-03"]);
        assert_eq!(chart.series[0].data, vec![35.0, 40.0]);
        assert_eq!(filter.start, NaiveDate::from_ymd_opt(2024, 2, 1));
    }

    #[test]
    fn test_chart_uses_config_defaults() {
        let config = LedgerConfig {
            default_time_unit: TimeUnit::Year,
            uncategorized_label: "Untagged".to_string(),
            ..Default::default()
        };
        let raw = vec![row("2023-06-01", 5.0, 0.0), row("2024-06-01", 0.0, 2.0)];
        let report = process_ledger(&config, &raw, &[]).unwrap();

        let by_year = LedgerProcessor::chart(
            &config,
            &report,
            &TransactionFilter::default(),
            &AggregationOptions::default(),
            &TagMaps::default(),
        )
        .unwrap();
        assert_eq!(by_year.labels, vec!["2023", "2024"]);

        let by_category = LedgerProcessor::chart(
            &config,
            &report,
            &TransactionFilter::default(),
            &AggregationOptions {
                primary: Dimension::Category,
                ..Default::default()
            },
            &TagMaps::default(),
        )
        .unwrap();
        assert_eq!(by_category.labels, vec!["Untagged"]);
        assert_eq!(by_category.series[0].data, vec![3.0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LedgerConfig {
            split_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            process_ledger(&config, &[], &[]),
            Err(LedgerError::InvalidConfig(_))
        ));
    }
}
