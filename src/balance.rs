use crate::normalize::parse_date;
use crate::schema::Transaction;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

/// Balance figures for a ledger.
///
/// Manual entries record history that is already reflected in the opening
/// balance. They stay in the totals, and `manual_offset` moves the opening
/// balance back so they are not counted twice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Financials {
    pub manual_offset: f64,
    pub adjusted_opening_balance: f64,
    pub current_balance: f64,
    pub total_income: f64,
    pub total_expense: f64,
}

pub struct BalanceEngine {
    opening_balance: f64,
}

impl BalanceEngine {
    /// Non-finite opening balances are treated as zero.
    pub fn new(opening_balance: f64) -> Self {
        Self {
            opening_balance: finite_or_zero(opening_balance),
        }
    }

    pub fn compute(&self, transactions: &[Transaction]) -> Financials {
        let mut total_income = 0.0;
        let mut total_expense = 0.0;
        let mut manual_income = 0.0;
        let mut manual_expense = 0.0;

        for tx in transactions {
            let income = tx.income_amount();
            let expense = tx.expense_amount();

            total_income += income;
            total_expense += expense;

            if tx.is_manual() {
                manual_income += income;
                manual_expense += expense;
            }
        }

        let manual_offset = manual_expense - manual_income;
        let adjusted_opening_balance = self.opening_balance + manual_offset;
        let current_balance = adjusted_opening_balance + total_income - total_expense;

        debug!(
            "Computed financials over {} transactions: opening {:.2}, offset {:.2}, current {:.2}",
            transactions.len(),
            self.opening_balance,
            manual_offset,
            current_balance
        );

        Financials {
            manual_offset,
            adjusted_opening_balance,
            current_balance,
            total_income,
            total_expense,
        }
    }
}

/// Adds the net of every transaction dated strictly before `date` to `seed`.
/// Records with unreadable dates are ignored.
pub fn running_total_before(seed: f64, transactions: &[Transaction], date: NaiveDate) -> f64 {
    transactions
        .iter()
        .filter(|tx| parse_date(&tx.date).is_some_and(|d| d < date))
        .fold(seed, |acc, tx| acc + tx.net())
}

pub fn compute_financials(opening_balance: f64, transactions: &[Transaction]) -> Financials {
    BalanceEngine::new(opening_balance).compute(transactions)
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
