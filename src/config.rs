//! Run configuration.
//!
//! One explicit `RunConfig` value is built from CLI args (with `.env` and
//! environment fallbacks) and passed into every entry point.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::calendar::parse_exception_days;
use crate::data::cme::DEFAULT_BASE_URL;
use crate::data::default_sources;
use crate::domain::Source;
use crate::error::AppError;
use crate::ledger::writer::{DEFAULT_LEDGER_DATE_FORMAT, LedgerPaths};

pub const DEFAULT_MAX_LOOKBACK_DAYS: u32 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LEDGER_DIR: &str = "ledger";

/// Market holidays skipped by calendar-gated sources unless overridden.
pub const DEFAULT_EXCEPTION_DAYS: [&str; 4] = ["01/01/2025", "04/20/2025", "05/21/2025", "12/25/2025"];

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Requested trade date as typed (`MM/DD/YYYY`); `None` means yesterday.
    pub date: Option<String>,
    pub ledger: LedgerPaths,
    pub sources: Vec<Source>,
    pub exception_days: BTreeSet<NaiveDate>,
    pub max_lookback_days: u32,
    pub fetch_timeout: Duration,
    pub parallel_fetch: bool,
    pub base_url: String,
    pub date_format: String,
    pub dump_dir: Option<PathBuf>,
    pub export_resume: Option<PathBuf>,
}

impl RunConfig {
    /// Defaults with ledger files under `ledger_dir`.
    pub fn with_ledger_dir(ledger_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let ledger_dir: PathBuf = ledger_dir.into();
        Ok(Self {
            date: None,
            ledger: LedgerPaths::in_dir(&ledger_dir),
            sources: default_sources(),
            exception_days: parse_exception_days(DEFAULT_EXCEPTION_DAYS)?,
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            parallel_fetch: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            date_format: DEFAULT_LEDGER_DATE_FORMAT.to_string(),
            dump_dir: None,
            export_resume: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_production_setup() {
        let config = RunConfig::with_ledger_dir("work").unwrap();
        assert_eq!(config.max_lookback_days, 10);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.sources.len(), 6);
        assert_eq!(config.exception_days.len(), 4);
        assert!(config.exception_days.contains(&NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()));
        assert_eq!(config.ledger.data_template, PathBuf::from("work/data.template.json"));
    }
}
