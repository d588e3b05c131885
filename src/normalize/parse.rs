//! Locale-tolerant parsing of calendar dates and money amounts.
//!
//! Clients send dates as `YYYY-MM-DD`, `DD/MM/YYYY`, compact `DDMMYYYY` or a
//! full ISO datetime, and amounts either as JSON numbers or as strings in
//! Brazilian (`1.234,56`) or plain (`1234.56`) notation.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde_json::Value;

/// Parse a calendar date in any accepted client format.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let bytes = s.as_bytes();

    // ISO date, possibly the prefix of an ISO datetime.
    if bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        let head = s.get(..10)?;
        return NaiveDate::parse_from_str(head, "%Y-%m-%d").ok();
    }

    if bytes.len() >= 10 && bytes[2] == b'/' && bytes[5] == b'/' {
        let head = s.get(..10)?;
        return NaiveDate::parse_from_str(head, "%d/%m/%Y").ok();
    }

    if bytes.len() == 8 && bytes.iter().all(u8::is_ascii_digit) {
        let day = s[0..2].parse().ok()?;
        let month = s[2..4].parse().ok()?;
        let year = s[4..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// Dates are only ever read from strings; a bare number cannot be told apart
/// from a compact date that lost its leading zero.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date)
}

/// Parse a `YYYY-MM` month into its inclusive first and last day.
pub fn month_range(raw: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, month) = raw.trim().split_once('-')?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Parse a `YYYY` year into its inclusive first and last day.
pub fn year_range(raw: &str) -> Option<(NaiveDate, NaiveDate)> {
    let raw = raw.trim();
    if raw.len() != 4 {
        return None;
    }
    let year: i32 = raw.parse().ok()?;
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

fn brazilian_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-?(\d{1,3}(\.\d{3})+(,\d+)?|\d+,\d+)$").expect("static regex is valid")
    })
}

/// `1.500` style: one dot followed by exactly three digits is grouping.
fn single_group_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[1-9]\d{0,2}\.\d{3}$").expect("static regex is valid"))
}

fn plain_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d+(\.\d*)?|\.\d+)$").expect("static regex is valid"))
}

fn grouped_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").expect("static regex is valid"))
}

/// Parse an amount string. Returns `None` for anything that is not a finite
/// number in one of the accepted notations.
pub fn parse_amount_str(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(rest) = s.strip_prefix("-R$") {
        s = format!("-{rest}");
    }
    if s.is_empty() {
        return None;
    }

    // A lone dot is a decimal point unless exactly three digits follow it.
    let canonical = if single_group_amount().is_match(&s) {
        s.replace('.', "")
    } else if plain_amount().is_match(&s) {
        s
    } else if brazilian_amount().is_match(&s) {
        s.replace('.', "").replace(',', ".")
    } else if grouped_amount().is_match(&s) {
        s.replace(',', "")
    } else {
        return None;
    };

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a JSON value as an amount: numbers directly, strings by notation.
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_amount_str(s),
        _ => None,
    }
}

/// Like [`parse_amount`] with a caller-supplied fallback.
pub fn parse_amount_or(value: &Value, default: f64) -> f64 {
    parse_amount(value).unwrap_or(default)
}
