//! Command-line parsing for the settlement ledger updater.
//!
//! Argument parsing and command dispatch stay separate from the fetch and
//! ledger code. Most flags fall back to `SETTLE_*` environment variables,
//! which may also come from a `.env` file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_LEDGER_DIR, DEFAULT_MAX_LOOKBACK_DAYS};
use crate::data::cme::DEFAULT_BASE_URL;
use crate::ledger::bootstrap::DEFAULT_TEMPLATE_MONTHS;
use crate::ledger::writer::DEFAULT_LEDGER_DATE_FORMAT;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "settle", version, about = "CME settlement prices into template ledgers")]
pub struct Cli {
    /// Also append logs to daily files <DIR>/log.<date>.txt (newest 4 kept).
    #[arg(long, global = true, env = "SETTLE_LOG_DIR", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch settlements for a trade date and update the ledgers.
    Run(RunArgs),
    /// Write starter data/resume templates for the configured sources.
    InitTemplates(InitArgs),
    /// List the configured sources.
    Sources(LedgerArgs),
    /// Check that a date is a valid MM/DD/YYYY calendar date.
    CheckDate(CheckDateArgs),
}

/// Ledger locations and source catalog, shared by every ledger-facing command.
#[derive(Debug, Parser, Clone)]
pub struct LedgerArgs {
    /// Directory holding the ledger files.
    #[arg(long, env = "SETTLE_LEDGER_DIR", default_value = DEFAULT_LEDGER_DIR)]
    pub ledger_dir: PathBuf,

    /// Data template (default: <ledger-dir>/data.template.json).
    #[arg(long, env = "SETTLE_DATA_TEMPLATE")]
    pub data_template: Option<PathBuf>,

    /// Data instance (default: <ledger-dir>/data.json).
    #[arg(long, env = "SETTLE_DATA_INSTANCE")]
    pub data_instance: Option<PathBuf>,

    /// Resume template (default: <ledger-dir>/resume.template.json).
    #[arg(long, env = "SETTLE_RESUME_TEMPLATE")]
    pub resume_template: Option<PathBuf>,

    /// Resume instance (default: <ledger-dir>/resume.json).
    #[arg(long, env = "SETTLE_RESUME_INSTANCE")]
    pub resume_instance: Option<PathBuf>,

    /// JSON array of sources replacing the built-in CME catalog.
    #[arg(long, env = "SETTLE_SOURCES_FILE", value_name = "JSON")]
    pub sources: Option<PathBuf>,
}

/// Options for `settle run`.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Trade date (MM/DD/YYYY). Defaults to yesterday.
    #[arg(short, long)]
    pub date: Option<String>,

    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Earlier days tried when the requested day has no settlements.
    #[arg(long, env = "SETTLE_MAX_LOOKBACK_DAYS", default_value_t = DEFAULT_MAX_LOOKBACK_DAYS)]
    pub max_lookback_days: u32,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "SETTLE_FETCH_TIMEOUT", default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,

    /// Fetch sources one at a time instead of in parallel.
    #[arg(long)]
    pub sequential: bool,

    /// Market-closed days (MM/DD/YYYY, comma separated). Replaces the built-in list.
    #[arg(long = "exception-day", env = "SETTLE_EXCEPTION_DAYS", value_delimiter = ',')]
    pub exception_days: Vec<String>,

    /// chrono format for the date column of the data ledger.
    #[arg(long, env = "SETTLE_LEDGER_DATE_FORMAT", default_value = DEFAULT_LEDGER_DATE_FORMAT)]
    pub ledger_date_format: String,

    /// Settlements endpoint base URL.
    #[arg(long, env = "CME_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Write a JSON snapshot per source into this directory.
    #[arg(long, env = "SETTLE_DUMP_DIR", value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Export this run's resume rows to CSV.
    #[arg(long = "export-resume", value_name = "CSV")]
    pub export_resume: Option<PathBuf>,
}

/// Options for `settle init-templates`.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Contract-month columns laid out per source.
    #[arg(long, default_value_t = DEFAULT_TEMPLATE_MONTHS)]
    pub months: usize,

    /// Overwrite existing templates.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct CheckDateArgs {
    /// Date text to check.
    pub date: String,
}
