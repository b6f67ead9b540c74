use crate::config::TimeUnit;
use crate::error::{LedgerError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Monday of the week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// First day of the bucket `date` falls in.
pub fn bucket_start(date: NaiveDate, unit: TimeUnit) -> NaiveDate {
    match unit {
        TimeUnit::Day => date,
        TimeUnit::Week => start_of_week(date),
        TimeUnit::Month => date.with_day(1).unwrap_or(date),
        TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

/// Chart label for the bucket that starts at `start`. Labels sort in
/// chronological order.
///
/// # Examples
/// - Day / Week: `2024-03-04`
/// - Month: `2024-03`
/// - Year: `2024`
pub fn bucket_label(start: NaiveDate, unit: TimeUnit) -> String {
    match unit {
        TimeUnit::Day | TimeUnit::Week => start.format("%Y-%m-%d").to_string(),
        TimeUnit::Month => start.format("%Y-%m").to_string(),
        TimeUnit::Year => format!("{:04}", start.year()),
    }
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_date, end_date), both inclusive.
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let (first, last) = match parts.as_slice() {
        [single] => (*single, *single),
        [first, last] => (*first, *last),
        _ => {
            return Err(LedgerError::DateError(format!(
                "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
                period
            )))
        }
    };

    let start = parse_month(first)?;
    let end_ref = parse_month(last)?;
    let end = last_day_of_month(end_ref.year(), end_ref.month()).ok_or_else(|| {
        LedgerError::DateError(format!("Period end out of range: {}", last))
    })?;

    if end < start {
        return Err(LedgerError::DateError(format!(
            "Period '{}' ends before it starts",
            period
        )));
    }

    Ok((start, end))
}

fn parse_month(value: &str) -> Result<NaiveDate> {
    let start_str = format!("{}-01", value.trim());
    NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        LedgerError::DateError(format!(
            "Invalid date format in period: {}. Expected YYYY-MM",
            value
        ))
    })
}
