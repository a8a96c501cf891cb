//! Settlement normalization.
//!
//! Turns a provider `settlements` array into one `NormalizedLine` plus its
//! `PlaceholderLine` twin:
//!
//! - exactly one `TOTAL` row must be present; it only feeds `volume`
//! - contract rows are sorted by contract month and numbered `month1..monthK`
//! - settle text is decoded according to the source's `DecimalStyle`
//! - a row whose contract month cannot be read is dropped (and logged), never zeroed

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::{DecimalStyle, NormalizedLine, PlaceholderLine, RawSettlementRow};
use crate::error::{AppError, ErrorKind};

/// Normalizer output.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub line: NormalizedLine,
    pub placeholder: PlaceholderLine,
    /// Contract rows dropped because their month could not be parsed.
    pub dropped: usize,
}

/// Normalize one day of settlements for `source_code`.
pub fn normalize(
    rows: &[RawSettlementRow],
    source_code: &str,
    style: DecimalStyle,
    trade_date: NaiveDate,
) -> Result<Normalized, AppError> {
    let (totals, contracts): (Vec<&RawSettlementRow>, Vec<&RawSettlementRow>) =
        rows.iter().partition(|r| r.is_total());

    let total = match totals.as_slice() {
        [total] => *total,
        [] => {
            return Err(AppError::new(
                ErrorKind::Parse,
                format!("{source_code}: payload has no TOTAL row"),
            ));
        }
        many => {
            return Err(AppError::new(
                ErrorKind::Parse,
                format!("{source_code}: payload has {} TOTAL rows", many.len()),
            ));
        }
    };

    let mut dated = Vec::with_capacity(contracts.len());
    let mut dropped = 0usize;
    for row in contracts {
        match contract_month(row) {
            Some(month) => dated.push((month, row)),
            None => {
                dropped += 1;
                warn!(source = source_code, month = %row.month, "Dropping settlement row with unreadable contract month");
            }
        }
    }

    if dated.is_empty() {
        return Err(AppError::new(
            ErrorKind::Parse,
            format!("{source_code}: no contract rows with a readable month"),
        ));
    }

    // Stable sort keeps provider order for duplicate months.
    dated.sort_by_key(|(month, _)| *month);

    let mut months = Vec::with_capacity(dated.len());
    for (_, row) in &dated {
        let settle = parse_settle(&row.settle, style).map_err(|e| {
            AppError::new(
                ErrorKind::Parse,
                format!("{source_code} {}: {}", row.month.trim(), e.message()),
            )
        })?;
        months.push(settle);
    }

    let volume = parse_volume(&total.volume)
        .map_err(|e| AppError::new(ErrorKind::Parse, format!("{source_code} TOTAL: {}", e.message())))?;

    let line = NormalizedLine {
        date: trade_date,
        volume,
        months,
    };
    let placeholder = PlaceholderLine::for_line(source_code, &line);

    Ok(Normalized {
        line,
        placeholder,
        dropped,
    })
}

/// Decode a settle price according to the source's quoting style.
pub fn parse_settle(raw: &str, style: DecimalStyle) -> Result<f64, AppError> {
    let text = raw.trim();
    let normalized = match style {
        DecimalStyle::Dot => text.replace(',', "."),
        DecimalStyle::Tick => text.replace('\'', "."),
    };
    parse_number(&normalized, raw)
}

/// Decode the TOTAL row volume (same encoding for every style).
///
/// Several commas are thousands separators (`1,234,567`); a single comma is
/// the decimal separator (`3,5`).
pub fn parse_volume(raw: &str) -> Result<f64, AppError> {
    let text = raw.trim();
    let normalized = if text.matches(',').count() > 1 {
        text.replace(',', "")
    } else {
        text.replace(',', ".")
    };
    parse_number(&normalized, raw)
}

fn parse_number(text: &str, raw: &str) -> Result<f64, AppError> {
    let value: f64 = text
        .parse()
        .map_err(|_| AppError::new(ErrorKind::Parse, format!("malformed number '{raw}'")))?;
    if !value.is_finite() {
        return Err(AppError::new(ErrorKind::Parse, format!("non-finite number '{raw}'")));
    }
    Ok(value)
}

/// Contract month of a row: the ISO `settlementMonth` when present, else the label.
pub fn contract_month(row: &RawSettlementRow) -> Option<NaiveDate> {
    if let Some(iso) = row.settlement_month.as_deref() {
        if let Ok(date) = NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    parse_month_label(&row.month)
}

/// Parse labels like `JUN 2025`, `JUN 25` or `June 2025` to the first of that month.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    let year = label.split_whitespace().last()?;
    let format = match year.len() {
        2 => "%d %b %y",
        4 => "%d %b %Y",
        _ => return None,
    };
    NaiveDate::parse_from_str(&format!("1 {label}"), format).ok()
}
