//! Canonical forms for the heterogeneous values found in statements and the
//! ledger sheet. Nothing in here fails: input that cannot be understood is
//! passed through (strings) or coerced to zero (amounts).

use crate::schema::RawValue;
use chrono::NaiveDate;

/// Parses any of the supported date spellings into a calendar date.
///
/// Accepted forms:
/// - `DD/MM/YYYY` (day and month may be one digit)
/// - `YYYY-MM-DD`, optionally followed by `THH:MM:SS(.sss)Z`
/// - `YYYY-MM-DD HH:MM:SS`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.contains('/') {
        return parse_day_month_year(value);
    }

    parse_iso_prefix(value)
}

fn parse_day_month_year(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let (day, month, year) = (parts[0], parts[1], parts[2]);
    let shape_ok = is_digits(day, 1, 2) && is_digits(month, 1, 2) && is_digits(year, 4, 4);
    if !shape_ok {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_iso_prefix(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10)?;
    let rest = &value[10..];

    let time_ok = rest.is_empty()
        || ((rest.starts_with('T') || rest.starts_with(' '))
            && rest.len() > 1
            && rest[1..]
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | 'Z' | '+' | '-')));
    if !time_ok {
        return None;
    }

    let parts: Vec<&str> = date_part.split('-').collect();
    if parts.len() != 3
        || !is_digits(parts[0], 4, 4)
        || !is_digits(parts[1], 2, 2)
        || !is_digits(parts[2], 2, 2)
    {
        return None;
    }

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// Renders a date-like string as `YYYY-MM-DD`; anything else is returned
/// trimmed but otherwise unchanged.
pub fn normalize_date(value: &str) -> String {
    match parse_date(value) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => value.trim().to_string(),
    }
}

/// Renders a number the way the ledger sheet does: shortest round-trip form,
/// no trailing zeros, no exponent, and no negative zero.
pub fn canonical_number(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// Returns the numeric value of a plain number string, ignoring thousands
/// separators. `None` for anything that isn't just a number.
pub fn parse_plain_number(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    let unsigned = cleaned
        .strip_prefix('-')
        .or_else(|| cleaned.strip_prefix('+'))
        .unwrap_or(&cleaned);

    let mut pieces = unsigned.splitn(2, '.');
    let whole = pieces.next().unwrap_or("");
    let fraction = pieces.next();

    let whole_ok = whole.chars().all(|c| c.is_ascii_digit());
    let fraction_ok = fraction.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
    if whole.is_empty() && fraction.is_none() || !whole_ok || !fraction_ok {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Canonical string form of a text cell.
pub fn normalize_text(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Some(date) = parse_date(trimmed) {
        return date.format("%Y-%m-%d").to_string();
    }

    if let Some(number) = parse_plain_number(trimmed) {
        return canonical_number(number);
    }

    trimmed.to_string()
}

/// Canonical string form of any cell, so that equal values compare equal no
/// matter how the collaborator spelled them.
pub fn normalize_value(value: &RawValue) -> String {
    match value {
        RawValue::Empty => String::new(),
        RawValue::Number(n) => canonical_number(*n),
        RawValue::Text(s) => normalize_text(s),
    }
}

/// Lenient amount parsing: thousands separators are dropped, everything that
/// still isn't a finite number becomes zero.
pub fn parse_amount(value: &str) -> f64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Canonical form of an amount cell. Blank cells and zero are the same
/// amount; text that is not a number is kept verbatim (trimmed).
pub fn normalize_amount(value: &RawValue) -> String {
    if value.is_blank() {
        return canonical_number(0.0);
    }
    normalize_value(value)
}
