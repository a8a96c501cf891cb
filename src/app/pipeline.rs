//! The `settle run` pipeline.
//!
//! resolve date -> aggregate fetches -> optional snapshots -> ledger write -> optional CSV
//!
//! The provider is a parameter so the same workflow runs against the CME
//! client in production and a scripted provider in tests.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::calendar::{default_trade_date, format_request_date, parse_request_date};
use crate::config::RunConfig;
use crate::data::{CmeClient, SettlementProvider};
use crate::domain::Dataset;
use crate::error::{AppError, ErrorKind};
use crate::ledger::{self, WriteOptions, WriteSummary, Workbook};
use crate::settle::{self, AggregateOptions};

/// Everything a single `settle run` produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub trade_date: NaiveDate,
    /// The trade date came from the caller rather than the yesterday default.
    pub explicit_date: bool,
    pub dataset: Dataset,
    pub written: WriteSummary,
    pub snapshots: Vec<PathBuf>,
}

/// Parse the requested date, or fall back to the day before `today`.
pub fn resolve_trade_date(requested: Option<&str>, today: NaiveDate) -> Result<NaiveDate, AppError> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => parse_request_date(text),
        None => Ok(default_trade_date(today)),
    }
}

/// Run the pipeline against the CME settlements API.
pub fn run_ledger_with_cme(config: &RunConfig, today: NaiveDate, run_at: NaiveDateTime) -> Result<RunOutput, AppError> {
    let client = CmeClient::with_base_url(config.base_url.clone(), config.fetch_timeout)?;
    run_ledger(config, &client, today, run_at)
}

pub fn run_ledger<P>(config: &RunConfig, provider: &P, today: NaiveDate, run_at: NaiveDateTime) -> Result<RunOutput, AppError>
where
    P: SettlementProvider + ?Sized,
{
    let trade_date = resolve_trade_date(config.date.as_deref(), today)?;

    // No point hitting the network if the ledger cannot be written.
    for template in [&config.ledger.data_template, &config.ledger.resume_template] {
        if !template.is_file() {
            return Err(AppError::new(
                ErrorKind::Config,
                format!(
                    "Template '{}' not found (run `settle init-templates` first)",
                    template.display()
                ),
            ));
        }
    }

    info!(
        trade_date = %format_request_date(trade_date),
        sources = config.sources.len(),
        "Starting settlement run"
    );

    let dataset = settle::run(
        provider,
        &config.sources,
        trade_date,
        &config.exception_days,
        run_at,
        AggregateOptions {
            max_lookback_days: config.max_lookback_days,
            parallel: config.parallel_fetch,
        },
    );

    let snapshots = match &config.dump_dir {
        Some(dir) => crate::io::write_snapshots(dir, &dataset, &config.date_format)?,
        None => Vec::new(),
    };

    let written = ledger::write::<Workbook>(
        &dataset,
        &config.ledger,
        &WriteOptions {
            date_format: config.date_format.clone(),
        },
    )?;

    if let Some(path) = &config.export_resume {
        crate::io::write_resume_csv(path, &dataset)?;
    }

    Ok(RunOutput {
        trade_date,
        explicit_date: config.date.is_some(),
        dataset,
        written,
        snapshots,
    })
}
