//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - produced by the fetch/normalize stage
//! - folded into a per-run `Dataset`
//! - rendered into ledger rows or exported as JSON/CSV

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ErrorKind;

/// Region holding the per-source summary rows in the resume workbook.
pub const RESUME_TABLE: &str = "resumeData";

/// Label the provider uses for the aggregate-volume sentinel row.
pub const TOTAL_MONTH: &str = "TOTAL";

/// Timestamp format of `ResumeRow::date`.
pub const RESUME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a source encodes its settle prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalStyle {
    /// Plain decimals; a `,` decimal separator is accepted and read as `.`.
    Dot,
    /// Grain-style quotes where `'` separates the price fraction.
    Tick,
}

/// One configured settlement feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Region name in the ledger and placeholder namespace, e.g. `CU`.
    pub code: String,
    /// Human-readable origin written to the resume rows.
    pub display_name: String,
    /// Provider product id.
    pub provider_id: String,
    pub decimal_style: DecimalStyle,
    /// Run even when the trade date is a weekend or exception day.
    #[serde(default)]
    pub ignores_calendar_gate: bool,
}

/// One row of the provider's `settlements` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettlementRow {
    pub month: String,
    #[serde(default)]
    pub settle: String,
    #[serde(default)]
    pub volume: String,
    /// ISO first-of-month date (`YYYY-MM-DD`) when the provider supplies it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_month: Option<String>,
}

impl RawSettlementRow {
    pub fn is_total(&self) -> bool {
        self.month.trim().eq_ignore_ascii_case(TOTAL_MONTH)
    }
}

/// A provider response for one product and trade date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayload {
    #[serde(default)]
    pub settlements: Vec<RawSettlementRow>,
    #[serde(default)]
    pub trade_date: Option<String>,
    #[serde(default)]
    pub empty: bool,
}

impl RawPayload {
    /// The provider had nothing for the requested day.
    pub fn has_no_data(&self) -> bool {
        self.empty || self.settlements.is_empty()
    }
}

/// A single ledger cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// An ordered set of `field -> cell` pairs substituted into one region row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerRow {
    fields: Vec<(String, Cell)>,
}

impl LedgerRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, cell: Cell) -> Self {
        self.push(field, cell);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, cell: Cell) {
        self.fields.push((field.into(), cell));
    }

    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Placeholder text for `field` inside region `table`.
pub fn placeholder(table: &str, field: &str) -> String {
    format!("${{table:{table}.{field}}}")
}

/// Per-source output row: trade date, total volume and one settle per contract month.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLine {
    pub date: NaiveDate,
    pub volume: f64,
    /// Settle prices in ascending contract-month order (`month1..monthK`).
    pub months: Vec<f64>,
}

impl NormalizedLine {
    /// Field names in ledger order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.months.len() + 2);
        keys.push("date".to_string());
        keys.push("volume".to_string());
        keys.extend((1..=self.months.len()).map(|i| format!("month{i}")));
        keys
    }

    pub fn to_row(&self, date_format: &str) -> LedgerRow {
        let mut row = LedgerRow::new()
            .with("date", Cell::Text(self.date.format(date_format).to_string()))
            .with("volume", Cell::Number(self.volume));
        for (i, settle) in self.months.iter().enumerate() {
            row.push(format!("month{}", i + 1), Cell::Number(*settle));
        }
        row
    }
}

/// Symbolic twin of a `NormalizedLine`: same keys, every value a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderLine {
    pub table: String,
    pub keys: Vec<String>,
}

impl PlaceholderLine {
    pub fn for_line(table: &str, line: &NormalizedLine) -> Self {
        Self {
            table: table.to_string(),
            keys: line.keys(),
        }
    }

    pub fn value(&self, key: &str) -> String {
        placeholder(&self.table, key)
    }

    pub fn to_row(&self) -> LedgerRow {
        let mut row = LedgerRow::new();
        for key in &self.keys {
            row.push(key.clone(), Cell::Text(self.value(key)));
        }
        row
    }
}

/// Resume amount: number of non-TOTAL settlement rows received, or a failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAmount {
    Count(usize),
    Error,
}

impl ResumeAmount {
    pub fn to_cell(self) -> Cell {
        match self {
            ResumeAmount::Count(n) => Cell::Number(n as f64),
            ResumeAmount::Error => Cell::text("ERROR"),
        }
    }
}

impl Serialize for ResumeAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResumeAmount::Count(n) => serializer.serialize_u64(*n as u64),
            ResumeAmount::Error => serializer.serialize_str("ERROR"),
        }
    }
}

/// One summary record per source per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRow {
    #[serde(serialize_with = "serialize_timestamp")]
    pub date: NaiveDateTime,
    pub trade_date: String,
    pub origin: String,
    pub amount: ResumeAmount,
}

fn serialize_timestamp<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.format(RESUME_TIMESTAMP_FORMAT).to_string())
}

impl ResumeRow {
    pub const FIELDS: [&'static str; 4] = ["date", "tradeDate", "origin", "amount"];

    pub fn to_row(&self) -> LedgerRow {
        LedgerRow::new()
            .with("date", Cell::Text(self.date.format(RESUME_TIMESTAMP_FORMAT).to_string()))
            .with("tradeDate", Cell::text(self.trade_date.clone()))
            .with("origin", Cell::text(self.origin.clone()))
            .with("amount", self.amount.to_cell())
    }

    /// Trailing sentinel row that keeps the resume region open for the next run.
    pub fn placeholder_row() -> LedgerRow {
        let mut row = LedgerRow::new();
        for field in Self::FIELDS {
            row.push(field, Cell::Text(placeholder(RESUME_TABLE, field)));
        }
        row
    }
}

/// Coarse per-source status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub code: u16,
    pub kind: Option<ErrorKind>,
    pub description: String,
}

impl SourceStatus {
    pub fn ok() -> Self {
        Self {
            code: 200,
            kind: None,
            description: "OK".to_string(),
        }
    }

    pub fn failed(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            code: 500,
            kind: Some(kind),
            description: description.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 200
    }
}

/// Outcome of fetching and normalizing one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    pub code: String,
    pub status: SourceStatus,
    pub line: Option<NormalizedLine>,
    pub placeholder: Option<PlaceholderLine>,
    pub resume: ResumeRow,
}

impl SourceResult {
    pub fn failed(source: &Source, trade_date: String, run_at: NaiveDateTime, status: SourceStatus) -> Self {
        Self {
            code: source.code.clone(),
            status,
            line: None,
            placeholder: None,
            resume: ResumeRow {
                date: run_at,
                trade_date,
                origin: source.display_name.clone(),
                amount: ResumeAmount::Error,
            },
        }
    }
}

/// Results of one run keyed by source code, in configured source order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<SourceResult>,
    /// Sources not run because the trade date was closed for them.
    pub skipped: Vec<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `result.code`.
    pub fn insert(&mut self, result: SourceResult) {
        match self.entries.iter_mut().find(|e| e.code == result.code) {
            Some(slot) => *slot = result,
            None => self.entries.push(result),
        }
    }

    pub fn get(&self, code: &str) -> Option<&SourceResult> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceResult> {
        self.entries.iter()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.code.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.status.is_ok()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> NormalizedLine {
        NormalizedLine {
            date: NaiveDate::from_ymd_opt(2025, 5, 23).unwrap(),
            volume: 1725.0,
            months: vec![1.7375, 1.785, 1.8],
        }
    }

    #[test]
    fn placeholder_line_mirrors_value_keys() {
        let line = line();
        let tmp = PlaceholderLine::for_line("CU", &line);
        let values = line.to_row("%d/%m/%Y");
        let placeholders = tmp.to_row();

        let value_keys: Vec<_> = values.keys().collect();
        let tmp_keys: Vec<_> = placeholders.keys().collect();
        assert_eq!(value_keys, tmp_keys);
        assert_eq!(value_keys, ["date", "volume", "month1", "month2", "month3"]);
        assert_eq!(placeholders.get("month2"), Some(&Cell::text("${table:CU.month2}")));
        assert_eq!(values.get("date"), Some(&Cell::text("23/05/2025")));
    }

    #[test]
    fn resume_amount_serializes_as_number_or_marker() {
        assert_eq!(serde_json::to_string(&ResumeAmount::Count(14)).unwrap(), "14");
        assert_eq!(serde_json::to_string(&ResumeAmount::Error).unwrap(), "\"ERROR\"");
    }

    #[test]
    fn raw_payload_reads_provider_json() {
        let json = r#"{
            "empty": false,
            "tradeDate": "05/23/2025",
            "settlements": [
                {"month": "JUL 25", "settle": "1.7375", "volume": "120", "settlementMonth": "2025-07-01"},
                {"month": "TOTAL", "settle": "", "volume": "1,725"}
            ]
        }"#;
        let payload: RawPayload = serde_json::from_str(json).unwrap();
        assert!(!payload.has_no_data());
        assert_eq!(payload.trade_date.as_deref(), Some("05/23/2025"));
        assert!(payload.settlements[1].is_total());
        assert_eq!(payload.settlements[0].settlement_month.as_deref(), Some("2025-07-01"));
    }

    #[test]
    fn cells_round_trip_through_json() {
        let cells = vec![Cell::Empty, Cell::Number(1.5), Cell::text("x")];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,1.5,"x"]"#);
        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn dataset_insert_replaces_by_code() {
        let source = Source {
            code: "CU".into(),
            display_name: "CMEGroup Chicago-CU".into(),
            provider_id: "4708".into(),
            decimal_style: DecimalStyle::Dot,
            ignores_calendar_gate: false,
        };
        let run_at = NaiveDate::from_ymd_opt(2025, 5, 24).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut dataset = Dataset::new();
        dataset.insert(SourceResult::failed(&source, "a".into(), run_at, SourceStatus::failed(ErrorKind::Parse, "x")));
        dataset.insert(SourceResult::failed(&source, "b".into(), run_at, SourceStatus::failed(ErrorKind::Parse, "y")));
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.get("CU").unwrap().resume.trade_date, "b");
        assert_eq!(dataset.failed_count(), 1);
    }
}
