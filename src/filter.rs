use crate::config::UNCATEGORIZED;
use crate::error::Result;
use crate::normalize::parse_date;
use crate::schema::Transaction;
use crate::tags::{TagMaps, TripStatus};
use crate::utils::parse_period_string;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Selection applied to the working ledger before charts and tables.
///
/// Empty sets mean "no restriction". Category and trip sets may contain
/// "Uncategorized" to select untagged records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub categories: BTreeSet<String>,
    pub trips: BTreeSet<String>,
    pub statuses: BTreeSet<TripStatus>,
    /// Case-insensitive substring of description or document.
    pub search: Option<String>,
}

impl TransactionFilter {
    /// Filter covering a "YYYY-MM" or "YYYY-MM:YYYY-MM" period.
    pub fn for_period(period: &str) -> Result<Self> {
        let (start, end) = parse_period_string(period)?;
        Ok(Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })
    }

    pub fn matches(&self, tx: &Transaction, tags: &TagMaps) -> bool {
        self.matches_dates(tx)
            && matches_tag(&self.categories, tx.category_tag())
            && matches_tag(&self.trips, tx.trip())
            && self.matches_status(tx, tags)
            && self.matches_search(tx)
    }

    fn matches_dates(&self, tx: &Transaction) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(date) = parse_date(&tx.date) else {
            return false;
        };
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    fn matches_status(&self, tx: &Transaction, tags: &TagMaps) -> bool {
        if self.statuses.is_empty() {
            return true;
        }
        tx.trip()
            .and_then(|trip| tags.trip_status(trip))
            .is_some_and(|status| self.statuses.contains(&status))
    }

    fn matches_search(&self, tx: &Transaction) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        tx.description.to_lowercase().contains(&needle)
            || tx.document.to_lowercase().contains(&needle)
    }
}

fn matches_tag(allowed: &BTreeSet<String>, tag: Option<&str>) -> bool {
    allowed.is_empty() || allowed.contains(tag.unwrap_or(UNCATEGORIZED))
}

/// Records of `ledger` selected by `filter`, in ledger order.
pub fn filter_transactions(
    ledger: &[Transaction],
    filter: &TransactionFilter,
    tags: &TagMaps,
) -> Vec<Transaction> {
    ledger
        .iter()
        .filter(|tx| filter.matches(tx, tags))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, description: &str, category: Option<&str>, trip: Option<&str>) -> Transaction {
        Transaction {
            date: date.to_string(),
            description: description.to_string(),
            category: category.map(str::to_string),
            trip_event: trip.map(str::to_string),
            ..Default::default()
        }
    }

    fn ledger() -> Vec<Transaction> {
        vec![
            row("2024-01-15", "Train ticket", Some("Travel"), Some("Lisbon")),
            row("2024-02-03", "Groceries", Some("Food"), None),
            row("2024-03-20", "Hotel", Some("Travel"), Some("Porto")),
            row("garbage", "Unknown", None, None),
        ]
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let all = filter_transactions(&ledger(), &TransactionFilter::default(), &TagMaps::default());
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_period_filter() {
        let filter = TransactionFilter::for_period("2024-01:2024-02").unwrap();
        let selected = filter_transactions(&ledger(), &filter, &TagMaps::default());
        let names: Vec<&str> = selected.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["Train ticket", "Groceries"]);
    }

    #[test]
    fn test_uncategorized_selects_untagged() {
        let filter = TransactionFilter {
            categories: [UNCATEGORIZED.to_string()].into_iter().collect(),
            ..Default::default()
        };
        let selected = filter_transactions(&ledger(), &filter, &TagMaps::default());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].description, "Unknown");
    }

    #[test]
    fn test_status_filter_uses_tag_maps() {
        let mut tags = TagMaps::default();
        tags.trip_statuses.insert("Porto".to_string(), TripStatus::Investment);
        tags.trip_statuses.insert("Lisbon".to_string(), TripStatus::Active);

        let filter = TransactionFilter {
            statuses: [TripStatus::Investment].into_iter().collect(),
            ..Default::default()
        };
        let selected = filter_transactions(&ledger(), &filter, &tags);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].description, "Hotel");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = TransactionFilter {
            search: Some("HOTEL".to_string()),
            ..Default::default()
        };
        let selected = filter_transactions(&ledger(), &filter, &TagMaps::default());
        assert_eq!(selected.len(), 1);
    }
}
