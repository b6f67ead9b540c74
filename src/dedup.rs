use crate::normalize::{normalize_amount, normalize_date, normalize_text};
use crate::schema::{ImportedRow, Transaction};
use log::debug;
use std::collections::HashSet;

/// Separator between fingerprint fields (ASCII unit separator).
pub const FINGERPRINT_DELIMITER: char = '\u{1f}';

/// Records that can be compared as "the same real-world event".
pub trait Fingerprint {
    fn fingerprint(&self) -> String;
}

/// Builds the composite key from already-extracted fields.
pub fn build_fingerprint(
    date: &str,
    description: &str,
    document: &str,
    income: &str,
    expense: &str,
) -> String {
    let fields = [date, description, document, income, expense];
    let mut key = String::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            key.push(FINGERPRINT_DELIMITER);
        }
        key.push_str(field);
    }
    key
}

impl Fingerprint for Transaction {
    fn fingerprint(&self) -> String {
        build_fingerprint(
            &normalize_date(&self.date),
            &normalize_text(&self.description),
            &normalize_text(&self.document),
            &normalize_amount(&self.income),
            &normalize_amount(&self.expense),
        )
    }
}

impl Fingerprint for ImportedRow {
    fn fingerprint(&self) -> String {
        build_fingerprint(
            &normalize_date(&self.date),
            &normalize_text(&self.description),
            &normalize_text(&self.document),
            &normalize_amount(&self.cash_in),
            &normalize_amount(&self.cash_out),
        )
    }
}

/// Fingerprints of every record in `records`.
pub fn fingerprint_set<T: Fingerprint>(records: &[T]) -> HashSet<String> {
    records.iter().map(Fingerprint::fingerprint).collect()
}

/// Keeps the records of `new_records` whose fingerprint is absent from
/// `existing`, in their original order.
pub fn find_unique<N, E>(new_records: &[N], existing: &[E]) -> Vec<N>
where
    N: Fingerprint + Clone,
    E: Fingerprint,
{
    let known = fingerprint_set(existing);

    let unique: Vec<N> = new_records
        .iter()
        .filter(|record| !known.contains(&record.fingerprint()))
        .cloned()
        .collect();

    debug!(
        "Duplicate check: {} incoming, {} already in ledger, {} new",
        new_records.len(),
        new_records.len() - unique.len(),
        unique.len()
    );

    unique
}
