//! Run every configured source and fold the results into a `Dataset`.
//!
//! A single source failing never aborts the run: its entry is recorded with a
//! 500 status and the loop carries on. Partial datasets are the normal case.

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use tracing::{error, info};

use crate::calendar::{format_request_date, is_market_closed};
use crate::data::SettlementProvider;
use crate::domain::{Dataset, Source, SourceResult, SourceStatus};
use crate::error::ErrorKind;
use crate::settle::fetcher::fetch_source;

/// Knobs for one aggregation pass.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub max_lookback_days: u32,
    pub parallel: bool,
}

/// Fetch all sources for `date`.
///
/// On a weekend or exception day only sources flagged `ignores_calendar_gate`
/// are fetched; the rest are listed in `Dataset::skipped`.
pub fn run<P>(
    provider: &P,
    sources: &[Source],
    date: NaiveDate,
    exception_days: &BTreeSet<NaiveDate>,
    run_at: NaiveDateTime,
    options: AggregateOptions,
) -> Dataset
where
    P: SettlementProvider + ?Sized,
{
    let closed = is_market_closed(date, exception_days);
    if closed {
        info!(date = %format_request_date(date), "Date is in exception list or is weekend.");
    }

    let (active, skipped): (Vec<&Source>, Vec<&Source>) =
        sources.iter().partition(|s| !closed || s.ignores_calendar_gate);

    let fetch_one = |source: &Source| -> SourceResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            fetch_source(provider, source, date, run_at, options.max_lookback_days)
        }));
        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(source = %source.code, "Fetch aborted: {reason}");
                SourceResult::failed(
                    source,
                    format_request_date(date),
                    run_at,
                    SourceStatus::failed(ErrorKind::Transport, format!("fetch aborted: {reason}")),
                )
            }
        }
    };

    // Collected in configured order either way; the writer only sees the full set.
    let results: Vec<SourceResult> = if options.parallel {
        active.par_iter().map(|s| fetch_one(*s)).collect()
    } else {
        active.iter().map(|s| fetch_one(*s)).collect()
    };

    let mut dataset = Dataset::new();
    for result in results {
        if result.status.is_ok() {
            info!(source = %result.code, "Source OK");
        } else {
            error!(
                source = %result.code,
                code = result.status.code,
                kind = result.status.kind.map(|k| k.label()).unwrap_or(""),
                "Source failed: {}",
                result.status.description
            );
        }
        dataset.insert(result);
    }
    dataset.skipped = skipped.iter().map(|s| s.code.clone()).collect();

    info!(
        fetched = dataset.len(),
        failed = dataset.failed_count(),
        skipped = dataset.skipped.len(),
        "Aggregation finished"
    );
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FetchError;
    use crate::domain::{RawPayload, ResumeAmount};
    use crate::settle::fetcher::tests::{ScriptedProvider, payload, source, ymd};

    fn options(parallel: bool) -> AggregateOptions {
        AggregateOptions {
            max_lookback_days: 10,
            parallel,
        }
    }

    fn run_at() -> NaiveDateTime {
        ymd(2025, 5, 27).and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn partial_failure_keeps_every_entry() {
        // 2025-05-22 is a Thursday.
        let day = ymd(2025, 5, 22);
        let provider = ScriptedProvider::default()
            .with_day("1", day, Ok(payload(day, &["1.0", "1.1"])))
            .with_day("2", day, Err(FetchError::Transport("connection reset".into())))
            .with_day("3", day, Ok(payload(day, &["3.0"])));
        let sources = vec![source("A", "1"), source("B", "2"), source("C", "3")];

        for parallel in [false, true] {
            let dataset = run(&provider, &sources, day, &BTreeSet::new(), run_at(), options(parallel));
            assert_eq!(dataset.len(), 3);
            assert_eq!(dataset.codes().collect::<Vec<_>>(), ["A", "B", "C"]);
            assert_eq!(dataset.get("A").unwrap().status.code, 200);
            assert_eq!(dataset.get("C").unwrap().status.code, 200);
            let b = dataset.get("B").unwrap();
            assert_eq!(b.status.code, 500);
            assert_eq!(b.resume.amount, ResumeAmount::Error);
        }
    }

    #[test]
    fn closed_day_runs_only_exempt_sources() {
        // Saturday.
        let day = ymd(2025, 5, 24);
        let mut corn = source("CORN", "300");
        corn.ignores_calendar_gate = true;
        let provider = ScriptedProvider::default().with_day("300", day, Ok(payload(day, &["440"])));
        let sources = vec![source("CU", "4708"), corn];

        let dataset = run(&provider, &sources, day, &BTreeSet::new(), run_at(), options(false));
        assert_eq!(dataset.codes().collect::<Vec<_>>(), ["CORN"]);
        assert_eq!(dataset.skipped, ["CU"]);
        assert!(provider.calls.lock().unwrap().iter().all(|(id, _)| id == "300"));
    }

    #[test]
    fn exception_day_closes_gated_sources() {
        let day = ymd(2025, 12, 25);
        let holidays = BTreeSet::from([day]);
        let provider = ScriptedProvider::default();
        let dataset = run(&provider, &[source("CU", "4708")], day, &holidays, run_at(), options(false));
        assert!(dataset.is_empty());
        assert_eq!(dataset.skipped, ["CU"]);
    }

    struct PanickingProvider;

    impl SettlementProvider for PanickingProvider {
        fn fetch(&self, provider_id: &str, _date: NaiveDate) -> Result<RawPayload, FetchError> {
            if provider_id == "bad" {
                panic!("provider bug");
            }
            Ok(RawPayload {
                settlements: Vec::new(),
                trade_date: None,
                empty: true,
            })
        }
    }

    #[test]
    fn panicking_provider_is_contained() {
        let day = ymd(2025, 5, 22);
        let sources = vec![source("X", "bad"), source("Y", "ok")];
        let opts = AggregateOptions {
            max_lookback_days: 1,
            parallel: false,
        };
        let dataset = run(&PanickingProvider, &sources, day, &BTreeSet::new(), run_at(), opts);
        assert_eq!(dataset.len(), 2);
        let x = dataset.get("X").unwrap();
        assert_eq!(x.status.code, 500);
        assert!(x.status.description.contains("provider bug"));
        assert_eq!(dataset.get("Y").unwrap().status.kind, Some(ErrorKind::NoDataInWindow));
    }
}
