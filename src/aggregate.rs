//! Chart series over the working ledger.
//!
//! Records are grouped along a primary dimension (and optionally a secondary
//! one), a metric is summed per group, and the result is laid out as
//! `labels` + `series` ready for a chart collaborator. Keys are always sorted
//! ascending so identical inputs render identically.

use crate::balance::running_total_before;
use crate::config::{TimeUnit, UNCATEGORIZED};
use crate::error::{LedgerError, Result};
use crate::normalize::parse_date;
use crate::schema::Transaction;
use crate::tags::TagMaps;
use crate::utils::{bucket_label, bucket_start};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Time buckets of `time_unit` size.
    Date,
    Category,
    Trip,
    /// The trip's type, looked up in the tag maps.
    TripType,
    /// The trip's status, looked up in the tag maps.
    TripStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Income,
    Expense,
    /// Income minus expense.
    Net,
    /// Running balance after each date bucket.
    Balance,
}

impl Metric {
    fn value_of(self, tx: &Transaction) -> f64 {
        match self {
            Metric::Income => tx.income_amount(),
            Metric::Expense => tx.expense_amount(),
            Metric::Net | Metric::Balance => tx.net(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Income => write!(f, "income"),
            Metric::Expense => write!(f, "expense"),
            Metric::Net => write!(f, "net"),
            Metric::Balance => write!(f, "balance"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationOptions {
    pub primary: Dimension,
    pub secondary: Option<Dimension>,
    pub metric: Metric,
    /// Bucket size for `Dimension::Date`; months when unset.
    pub time_unit: Option<TimeUnit>,
    /// Records dated before this are left out of the chart. For the balance
    /// metric they still count towards the starting balance.
    pub window_start: Option<NaiveDate>,
    /// Adjusted opening balance (see `Financials`), used by `Metric::Balance`.
    pub opening_balance: f64,
    /// Bucket name for records with no value in a tag dimension.
    pub uncategorized_label: String,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            primary: Dimension::Date,
            secondary: None,
            metric: Metric::Net,
            time_unit: None,
            window_start: None,
            opening_balance: 0.0,
            uncategorized_label: UNCATEGORIZED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

/// Aggregates without trip tag maps; trip type and status dimensions then
/// bucket everything under the uncategorized label.
pub fn aggregate(transactions: &[Transaction], options: &AggregationOptions) -> Result<ChartData> {
    aggregate_with_tags(transactions, options, &TagMaps::default())
}

pub fn aggregate_with_tags(
    transactions: &[Transaction],
    options: &AggregationOptions,
    tags: &TagMaps,
) -> Result<ChartData> {
    let grouper = Grouper {
        unit: options.time_unit.unwrap_or_default(),
        tags,
        fallback: &options.uncategorized_label,
    };

    let chart = match (options.metric, options.secondary) {
        (Metric::Balance, _) => balance_series(transactions, options, &grouper)?,
        (metric, None) => single_series(transactions, options, metric, &grouper),
        (metric, Some(secondary)) => {
            grouped_series(transactions, options, metric, secondary, &grouper)
        }
    };

    debug!(
        "Aggregated {} transactions into {} labels x {} series ({:?} by {:?})",
        transactions.len(),
        chart.labels.len(),
        chart.series.len(),
        options.metric,
        options.primary
    );

    Ok(chart)
}

struct Grouper<'a> {
    unit: TimeUnit,
    tags: &'a TagMaps,
    fallback: &'a str,
}

impl Grouper<'_> {
    /// Bucket key of `tx` along `dimension`. `None` only for date buckets of
    /// records whose date cannot be read.
    fn key(&self, tx: &Transaction, dimension: Dimension) -> Option<String> {
        let tag = match dimension {
            Dimension::Date => {
                let date = parse_date(&tx.date)?;
                return Some(bucket_label(bucket_start(date, self.unit), self.unit));
            }
            Dimension::Category => tx.category_tag().map(str::to_string),
            Dimension::Trip => tx.trip().map(str::to_string),
            Dimension::TripType => tx
                .trip()
                .and_then(|trip| self.tags.trip_type(trip))
                .map(str::to_string),
            Dimension::TripStatus => tx
                .trip()
                .and_then(|trip| self.tags.trip_status(trip))
                .map(|status| status.to_string()),
        };

        Some(tag.unwrap_or_else(|| self.fallback.to_string()))
    }
}

/// Whether `tx` falls inside the chart window.
fn in_window(tx: &Transaction, window_start: Option<NaiveDate>) -> bool {
    match window_start {
        None => true,
        Some(start) => parse_date(&tx.date).is_some_and(|d| d >= start),
    }
}

fn single_series(
    transactions: &[Transaction],
    options: &AggregationOptions,
    metric: Metric,
    grouper: &Grouper,
) -> ChartData {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|tx| in_window(tx, options.window_start))
    {
        if let Some(key) = grouper.key(tx, options.primary) {
            *totals.entry(key).or_default() += metric.value_of(tx);
        }
    }

    let (labels, data) = totals.into_iter().unzip();
    ChartData {
        labels,
        series: vec![Series {
            name: metric.to_string(),
            data,
        }],
    }
}

fn grouped_series(
    transactions: &[Transaction],
    options: &AggregationOptions,
    metric: Metric,
    secondary: Dimension,
    grouper: &Grouper,
) -> ChartData {
    let mut labels: BTreeSet<String> = BTreeSet::new();
    let mut grid: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

    for tx in transactions
        .iter()
        .filter(|tx| in_window(tx, options.window_start))
    {
        let (Some(primary), Some(series_key)) =
            (grouper.key(tx, options.primary), grouper.key(tx, secondary))
        else {
            continue;
        };

        *grid
            .entry(series_key)
            .or_default()
            .entry(primary.clone())
            .or_default() += metric.value_of(tx);
        labels.insert(primary);
    }

    let series = grid
        .into_iter()
        .map(|(name, points)| Series {
            name,
            data: labels
                .iter()
                .map(|label| points.get(label).copied().unwrap_or(0.0))
                .collect(),
        })
        .collect();

    ChartData {
        labels: labels.into_iter().collect(),
        series,
    }
}

/// Running balance per date bucket.
///
/// History before the window is folded into the starting value once, then
/// the buckets inside the window are walked forward.
fn balance_series(
    transactions: &[Transaction],
    options: &AggregationOptions,
    grouper: &Grouper,
) -> Result<ChartData> {
    if options.primary != Dimension::Date || options.secondary.is_some() {
        return Err(LedgerError::UnsupportedAggregation(
            "the balance metric needs a date primary dimension and no secondary dimension"
                .to_string(),
        ));
    }

    let mut running = match options.window_start {
        Some(start) => running_total_before(options.opening_balance, transactions, start),
        None => options.opening_balance,
    };

    let mut bucket_nets: BTreeMap<String, f64> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|tx| in_window(tx, options.window_start))
    {
        if let Some(key) = grouper.key(tx, Dimension::Date) {
            *bucket_nets.entry(key).or_default() += tx.net();
        }
    }

    let mut labels = Vec::with_capacity(bucket_nets.len());
    let mut data = Vec::with_capacity(bucket_nets.len());
    for (label, net) in bucket_nets {
        running += net;
        labels.push(label);
        data.push(running);
    }

    Ok(ChartData {
        labels,
        series: vec![Series {
            name: Metric::Balance.to_string(),
            data,
        }],
    })
}
