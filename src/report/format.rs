//! Terminal output for a run.
//!
//! Formatting lives here so the fetch and ledger code stay free of
//! presentation, and output changes stay local.

use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::format_request_date;
use crate::domain::{Dataset, ResumeAmount};
use crate::ledger::WriteSummary;

/// Per-source entry of the status payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetail {
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub description: String,
    pub trade_date: String,
    pub amount: ResumeAmount,
}

/// `{message, details}` printed at the end of `settle run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPayload {
    pub message: String,
    pub details: Vec<SourceDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

pub fn status_payload(dataset: &Dataset, trade_date: NaiveDate, explicit_date: bool) -> StatusPayload {
    let message = if explicit_date {
        format!("Getting the given day {}", format_request_date(trade_date))
    } else {
        "Data in ledger files for the day before today.".to_string()
    };
    let details = dataset
        .iter()
        .map(|e| SourceDetail {
            code: e.code.clone(),
            status: e.status.code,
            error: e.status.kind.map(|k| k.label()),
            description: e.status.description.clone(),
            trade_date: e.resume.trade_date.clone(),
            amount: e.resume.amount,
        })
        .collect();
    StatusPayload {
        message,
        details,
        skipped: dataset.skipped.clone(),
    }
}

/// Human-readable summary of one run.
pub fn format_run_summary(dataset: &Dataset, trade_date: NaiveDate, written: &WriteSummary) -> String {
    let mut out = String::new();

    out.push_str("=== settle - CME settlements ===\n");
    out.push_str(&format!("Trade date: {}\n", format_request_date(trade_date)));
    out.push_str(&format!(
        "Sources: run={} | ok={} | failed={} | skipped={}\n",
        dataset.len(),
        dataset.len() - dataset.failed_count(),
        dataset.failed_count(),
        dataset.skipped.len()
    ));
    out.push('\n');

    out.push_str(format!("{:<12} {:>6} {:<12} {:>7}  {}", "source", "status", "trade date", "amount", "note").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<6} {:-<12} {:-<7}  {:-<4}", "", "", "", "", "").trim_end());
    out.push('\n');

    for e in dataset.iter() {
        let amount = match e.resume.amount {
            ResumeAmount::Count(n) => n.to_string(),
            ResumeAmount::Error => "ERROR".to_string(),
        };
        let note = match e.status.kind {
            Some(kind) => format!("{kind}: {}", e.status.description),
            None => String::new(),
        };
        out.push_str(
            format!(
                "{:<12} {:>6} {:<12} {:>7}  {}",
                truncate(&e.code, 12),
                e.status.code,
                e.resume.trade_date,
                amount,
                note
            )
            .trim_end(),
        );
        out.push('\n');
    }
    for code in &dataset.skipped {
        out.push_str(&format!("{:<12} {:>6}  (market closed)\n", truncate(code, 12), "-"));
    }

    out.push_str(&format!(
        "\nLedger: {} region(s) updated, {} unchanged, {} resume row(s)\n",
        written.updated.len(),
        written.unchanged.len(),
        written.resume_rows
    ));

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DecimalStyle, ResumeRow, Source, SourceResult, SourceStatus};
    use crate::error::ErrorKind;

    fn dataset() -> Dataset {
        let run_at = NaiveDate::from_ymd_opt(2025, 5, 24).unwrap().and_hms_opt(6, 0, 0).unwrap();
        let source = Source {
            code: "NYH".into(),
            display_name: "CMEGroup New York-NYH".into(),
            provider_id: "4759".into(),
            decimal_style: DecimalStyle::Dot,
            ignores_calendar_gate: false,
        };
        let mut d = Dataset::new();
        d.insert(SourceResult {
            code: "CU".into(),
            status: SourceStatus::ok(),
            line: None,
            placeholder: None,
            resume: ResumeRow {
                date: run_at,
                trade_date: "05/23/2025".into(),
                origin: "CMEGroup Chicago-CU".into(),
                amount: ResumeAmount::Count(14),
            },
        });
        d.insert(SourceResult::failed(
            &source,
            "05/13/2025".into(),
            run_at,
            SourceStatus::failed(ErrorKind::NoDataInWindow, "nothing"),
        ));
        d.skipped.push("T2".into());
        d
    }

    #[test]
    fn payload_lists_every_entry() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 23).unwrap();
        let payload = status_payload(&dataset(), date, true);
        assert_eq!(payload.message, "Getting the given day 05/23/2025");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["details"][0]["amount"], 14);
        assert!(json["details"][0].get("error").is_none());
        assert_eq!(json["details"][1]["status"], 500);
        assert_eq!(json["details"][1]["error"], "NO_DATA_IN_WINDOW");
        assert_eq!(json["details"][1]["tradeDate"], "05/13/2025");
        assert_eq!(json["skipped"][0], "T2");
    }

    #[test]
    fn summary_mentions_failures_and_skips() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 23).unwrap();
        let written = WriteSummary {
            updated: vec!["CU".into()],
            unchanged: vec!["NYH".into()],
            resume_rows: 2,
        };
        let text = format_run_summary(&dataset(), date, &written);
        assert!(text.contains("ok=1 | failed=1 | skipped=1"));
        assert!(text.contains("NO_DATA_IN_WINDOW: nothing"));
        assert!(text.contains("T2"));
        assert!(text.contains("1 region(s) updated, 1 unchanged, 2 resume row(s)"));
    }
}
