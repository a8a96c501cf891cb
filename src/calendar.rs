//! Calendar helpers for trade-date requests.
//!
//! Requests arrive as `MM/DD/YYYY` text. Validation is strict: the shape must
//! match exactly and the day must exist in the calendar. Nothing is rolled
//! over (`02/30/2025` is rejected, not read as March 2nd).

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{AppError, ErrorKind};

pub const REQUEST_DATE_FORMAT: &str = "%m/%d/%Y";

/// True iff `text` is `\d{2}/\d{2}/\d{4}` and names a real calendar day.
pub fn validate(text: &str) -> bool {
    parse_strict(text).is_some()
}

/// Parse a request date, failing with `INVALID_DATE_FORMAT`.
pub fn parse_request_date(text: &str) -> Result<NaiveDate, AppError> {
    parse_strict(text).ok_or_else(|| {
        AppError::new(
            ErrorKind::InvalidDateFormat,
            format!("Wrong date format '{text}'. Expected format: MM/DD/YYYY"),
        )
    })
}

pub fn format_request_date(date: NaiveDate) -> String {
    date.format(REQUEST_DATE_FORMAT).to_string()
}

fn parse_strict(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() != 10 || bytes[2] != b'/' || bytes[5] != b'/' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let month: u32 = text[0..2].parse().ok()?;
    let day: u32 = text[3..5].parse().ok()?;
    let year: i32 = text[6..10].parse().ok()?;

    // `from_ymd_opt` refuses out-of-range components instead of normalizing them.
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    if date.month() != month || date.day() != day {
        return None;
    }
    Some(date)
}

/// Exactly one calendar day earlier.
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_exception_day(date: NaiveDate, exception_days: &BTreeSet<NaiveDate>) -> bool {
    exception_days.contains(&date)
}

/// Weekend or configured exchange holiday.
pub fn is_market_closed(date: NaiveDate, exception_days: &BTreeSet<NaiveDate>) -> bool {
    is_weekend(date) || is_exception_day(date, exception_days)
}

/// Trade date used when the trigger supplies none: the previous calendar day.
pub fn default_trade_date(today: NaiveDate) -> NaiveDate {
    previous_day(today)
}

/// Parse a list of `MM/DD/YYYY` exception days.
pub fn parse_exception_days<I, S>(items: I) -> Result<BTreeSet<NaiveDate>, AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for item in items {
        let text = item.as_ref().trim();
        if text.is_empty() {
            continue;
        }
        let date = parse_request_date(text).map_err(|e| {
            AppError::new(ErrorKind::Config, format!("Invalid exception day: {}", e.message()))
        })?;
        out.insert(date);
    }
    Ok(out)
}
