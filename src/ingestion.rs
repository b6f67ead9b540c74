use crate::dedup::{find_unique, Fingerprint};
use crate::normalize::normalize_date;
use crate::schema::{ImportedRow, RawValue, Transaction};
use log::info;
use serde::Serialize;

/// Result of reconciling a statement against the ledger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    /// Statement rows not yet in the ledger, in ledger shape.
    pub new_transactions: Vec<Transaction>,
    pub duplicate_count: usize,
}

impl From<&ImportedRow> for Transaction {
    fn from(row: &ImportedRow) -> Self {
        Transaction {
            date: normalize_date(&row.date),
            description: row.description.trim().to_string(),
            document: row.document.trim().to_string(),
            income: blank_as_empty(&row.cash_in),
            expense: blank_as_empty(&row.cash_out),
            ..Default::default()
        }
    }
}

fn blank_as_empty(value: &RawValue) -> RawValue {
    if value.is_blank() {
        RawValue::Empty
    } else {
        value.clone()
    }
}

/// Converts a batch of statement rows into the ledger's canonical shape.
pub fn convert_rows(rows: &[ImportedRow]) -> Vec<Transaction> {
    rows.iter().map(Transaction::from).collect()
}

/// Drops statement rows that are already in `existing` and converts the rest.
pub fn import_statement<E: Fingerprint>(rows: &[ImportedRow], existing: &[E]) -> ImportOutcome {
    let unique = find_unique(rows, existing);
    let duplicate_count = rows.len() - unique.len();

    info!(
        "Imported statement: {} rows, {} new, {} duplicates",
        rows.len(),
        unique.len(),
        duplicate_count
    );

    ImportOutcome {
        new_transactions: convert_rows(&unique),
        duplicate_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement_row(date: &str, description: &str, cash_in: &str, cash_out: &str) -> ImportedRow {
        ImportedRow {
            date: date.to_string(),
            description: description.to_string(),
            document: String::new(),
            cash_in: RawValue::from(cash_in),
            cash_out: RawValue::from(cash_out),
        }
    }

    #[test]
    fn test_conversion_to_ledger_shape() {
        let tx = Transaction::from(&statement_row("05/03/2024", " Rent ", "", "1,200.00"));
        assert_eq!(tx.date, "2024-03-05");
        assert_eq!(tx.description, "Rent");
        assert_eq!(tx.income, RawValue::Empty);
        assert_eq!(tx.expense_amount(), 1200.0);
        assert_eq!(tx.split_group_id, None);
    }

    #[test]
    fn test_converted_rows_keep_their_fingerprint() {
        let row = statement_row("05/03/2024", "Rent", "", "1,200.00");
        let tx = Transaction::from(&row);
        assert_eq!(row.fingerprint(), tx.fingerprint());
    }

    #[test]
    fn test_import_skips_known_rows() {
        let existing = vec![Transaction::from(&statement_row("2024-03-05", "Rent", "", "1200"))];
        let rows = vec![
            statement_row("05/03/2024", "Rent", "", "1,200.00"),
            statement_row("06/03/2024", "Refund", "15", ""),
        ];

        let outcome = import_statement(&rows, &existing);
        assert_eq!(outcome.duplicate_count, 1);
        assert_eq!(outcome.new_transactions.len(), 1);
        assert_eq!(outcome.new_transactions[0].description, "Refund");
        assert_eq!(outcome.new_transactions[0].income_amount(), 15.0);
    }

    #[test]
    fn test_repeated_import_is_a_no_op() {
        let rows = vec![statement_row("01/01/2024", "Coffee", "", "3.50")];
        let first = import_statement(&rows, &Vec::<Transaction>::new());
        let second = import_statement(&rows, &first.new_transactions);
        assert!(second.new_transactions.is_empty());
        assert_eq!(second.duplicate_count, 1);
    }
}
