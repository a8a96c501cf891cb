//! Per-source fetch with empty-day fallback.
//!
//! The provider answers "empty" for non-trading days. In that case we step back
//! one calendar day and ask again, up to `max_lookback_days` steps. Every
//! outcome, including transport and parse failures, comes back as a
//! `SourceResult`; nothing escapes this boundary as an error.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::calendar::{format_request_date, previous_day};
use crate::data::{FetchError, SettlementProvider};
use crate::domain::{RawPayload, ResumeAmount, ResumeRow, Source, SourceResult, SourceStatus};
use crate::error::ErrorKind;
use crate::settle::normalize::normalize;

/// Fetch and normalize one source, starting at `date` (already resolved by the caller).
pub fn fetch_source<P>(
    provider: &P,
    source: &Source,
    date: NaiveDate,
    run_at: NaiveDateTime,
    max_lookback_days: u32,
) -> SourceResult
where
    P: SettlementProvider + ?Sized,
{
    let mut current = date;
    let mut steps = 0u32;

    loop {
        match provider.fetch(&source.provider_id, current) {
            Ok(payload) if payload.has_no_data() => {
                if steps >= max_lookback_days {
                    let description = format!(
                        "No settlements for {} between {} and {}",
                        source.code,
                        format_request_date(current),
                        format_request_date(date)
                    );
                    error!(source = %source.code, lookback = max_lookback_days, "{description}");
                    return SourceResult::failed(
                        source,
                        format_request_date(current),
                        run_at,
                        SourceStatus::failed(ErrorKind::NoDataInWindow, description),
                    );
                }
                warn!(
                    source = %source.code,
                    date = %format_request_date(current),
                    attempt = steps + 1,
                    "No data found for date. Fetching previous day."
                );
                steps += 1;
                current = previous_day(current);
            }
            Ok(payload) => return build_result(source, current, run_at, payload),
            Err(err) => {
                let kind = match err {
                    FetchError::Transport(_) => ErrorKind::Transport,
                    FetchError::Decode(_) => ErrorKind::Parse,
                };
                error!(source = %source.code, date = %format_request_date(current), "{err}");
                return SourceResult::failed(
                    source,
                    format_request_date(current),
                    run_at,
                    SourceStatus::failed(kind, err.to_string()),
                );
            }
        }
    }
}

fn build_result(source: &Source, trade_date: NaiveDate, run_at: NaiveDateTime, payload: RawPayload) -> SourceResult {
    let trade_date_text = payload
        .trade_date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format_request_date(trade_date));

    match normalize(&payload.settlements, &source.code, source.decimal_style, trade_date) {
        Ok(normalized) => {
            let months = normalized.line.months.len();
            // Every non-TOTAL row the provider sent, readable month or not.
            let rows = months + normalized.dropped;
            info!(source = %source.code, trade_date = %trade_date_text, months, rows, "Settlements normalized");
            if normalized.dropped > 0 {
                debug!(source = %source.code, dropped = normalized.dropped, "Rows dropped during normalization");
            }
            SourceResult {
                code: source.code.clone(),
                status: SourceStatus::ok(),
                line: Some(normalized.line),
                placeholder: Some(normalized.placeholder),
                resume: ResumeRow {
                    date: run_at,
                    trade_date: trade_date_text,
                    origin: source.display_name.clone(),
                    amount: ResumeAmount::Count(rows),
                },
            }
        }
        Err(err) => {
            error!(source = %source.code, trade_date = %trade_date_text, "{err}");
            SourceResult::failed(
                source,
                trade_date_text,
                run_at,
                SourceStatus::failed(err.kind(), err.message()),
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{DecimalStyle, RawSettlementRow};

    /// Provider answering from a fixed script; unknown days are empty.
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub days: HashMap<(String, NaiveDate), Result<RawPayload, FetchError>>,
        pub calls: Mutex<Vec<(String, NaiveDate)>>,
    }

    impl ScriptedProvider {
        pub fn with_day(mut self, provider_id: &str, date: NaiveDate, payload: Result<RawPayload, FetchError>) -> Self {
            self.days.insert((provider_id.to_string(), date), payload);
            self
        }
    }

    impl SettlementProvider for ScriptedProvider {
        fn fetch(&self, provider_id: &str, date: NaiveDate) -> Result<RawPayload, FetchError> {
            self.calls.lock().unwrap().push((provider_id.to_string(), date));
            self.days
                .get(&(provider_id.to_string(), date))
                .cloned()
                .unwrap_or_else(|| {
                    Ok(RawPayload {
                        settlements: Vec::new(),
                        trade_date: None,
                        empty: true,
                    })
                })
        }
    }

    pub(crate) fn payload(date: NaiveDate, settles: &[&str]) -> RawPayload {
        let months = ["JUN 2025", "JUL 2025", "AUG 2025", "SEP 2025", "OCT 2025"];
        let mut settlements: Vec<RawSettlementRow> = settles
            .iter()
            .zip(months)
            .map(|(settle, month)| RawSettlementRow {
                month: month.to_string(),
                settle: settle.to_string(),
                volume: "10".to_string(),
                settlement_month: None,
            })
            .collect();
        settlements.push(RawSettlementRow {
            month: "TOTAL".to_string(),
            settle: String::new(),
            volume: "1725".to_string(),
            settlement_month: None,
        });
        RawPayload {
            settlements,
            trade_date: Some(format_request_date(date)),
            empty: false,
        }
    }

    pub(crate) fn source(code: &str, provider_id: &str) -> Source {
        Source {
            code: code.to_string(),
            display_name: format!("CMEGroup {code}"),
            provider_id: provider_id.to_string(),
            decimal_style: DecimalStyle::Dot,
            ignores_calendar_gate: false,
        }
    }

    pub(crate) fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run_at() -> NaiveDateTime {
        ymd(2025, 5, 27).and_hms_opt(8, 30, 0).unwrap()
    }

    #[test]
    fn falls_back_to_earliest_day_with_data() {
        let earliest = ymd(2025, 5, 23);
        let provider = ScriptedProvider::default().with_day("4708", earliest, Ok(payload(earliest, &["1.7", "1.8"])));

        let result = fetch_source(&provider, &source("CU", "4708"), ymd(2025, 5, 25), run_at(), 10);

        assert!(result.status.is_ok());
        assert_eq!(result.resume.trade_date, "05/23/2025");
        assert_eq!(result.resume.amount, ResumeAmount::Count(2));
        assert_eq!(result.line.as_ref().unwrap().date, earliest);
        let calls: Vec<_> = provider.calls.lock().unwrap().iter().map(|(_, d)| *d).collect();
        assert_eq!(calls, [ymd(2025, 5, 25), ymd(2025, 5, 24), earliest]);
    }

    #[test]
    fn lookback_is_bounded() {
        let provider = ScriptedProvider::default();
        let result = fetch_source(&provider, &source("CU", "4708"), ymd(2025, 5, 25), run_at(), 3);

        assert_eq!(result.status.code, 500);
        assert_eq!(result.status.kind, Some(ErrorKind::NoDataInWindow));
        assert_eq!(result.resume.amount, ResumeAmount::Error);
        assert!(result.line.is_none() && result.placeholder.is_none());
        assert_eq!(provider.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn transport_error_becomes_failed_result() {
        let day = ymd(2025, 5, 23);
        let provider = ScriptedProvider::default().with_day("4708", day, Err(FetchError::Transport("boom".into())));
        let result = fetch_source(&provider, &source("CU", "4708"), day, run_at(), 10);

        assert_eq!(result.status.code, 500);
        assert_eq!(result.status.kind, Some(ErrorKind::Transport));
        assert_eq!(result.resume.amount, ResumeAmount::Error);
        assert_eq!(result.resume.trade_date, "05/23/2025");
        assert_eq!(result.resume.date, run_at());
    }

    #[test]
    fn malformed_payload_becomes_parse_failure() {
        let day = ymd(2025, 5, 23);
        let provider = ScriptedProvider::default().with_day("4708", day, Ok(payload(day, &["1.7", "n/a"])));
        let result = fetch_source(&provider, &source("CU", "4708"), day, run_at(), 10);

        assert_eq!(result.status.kind, Some(ErrorKind::Parse));
        assert!(result.line.is_none());
    }

    #[test]
    fn resume_amount_counts_rows_with_unreadable_months() {
        let day = ymd(2025, 5, 23);
        let mut p = payload(day, &["1.7", "1.8", "1.9"]);
        p.settlements[1].month = "SPREAD".to_string();
        let provider = ScriptedProvider::default().with_day("4708", day, Ok(p));
        let result = fetch_source(&provider, &source("CU", "4708"), day, run_at(), 0);

        assert!(result.status.is_ok());
        assert_eq!(result.line.as_ref().unwrap().months, [1.7, 1.9]);
        assert_eq!(result.resume.amount, ResumeAmount::Count(3));
    }

    #[test]
    fn missing_provider_trade_date_uses_resolved_day() {
        let day = ymd(2025, 5, 22);
        let mut p = payload(day, &["1.7"]);
        p.trade_date = None;
        let provider = ScriptedProvider::default().with_day("4708", day, Ok(p));
        let result = fetch_source(&provider, &source("CU", "4708"), day, run_at(), 0);
        assert_eq!(result.resume.trade_date, "05/22/2025");
    }
}
