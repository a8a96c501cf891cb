//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - builds a `RunConfig` and dispatches the subcommand
//! - prints the run summary and status payload

use chrono::Local;
use clap::Parser;

use crate::calendar::{parse_exception_days, validate};
use crate::cli::{CheckDateArgs, Command, InitArgs, LedgerArgs, RunArgs};
use crate::config::{DEFAULT_EXCEPTION_DAYS, RunConfig};
use crate::data::{catalog, default_sources, load_sources};
use crate::domain::Source;
use crate::error::{AppError, ErrorKind};
use crate::ledger::LedgerPaths;

pub mod pipeline;

/// Entry point for the `settle` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    let _log_guard = crate::logging::init(cli.log_dir.as_deref())?;

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::InitTemplates(args) => handle_init(args),
        Command::Sources(args) => handle_sources(args),
        Command::CheckDate(args) => handle_check_date(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let now = Local::now().naive_local();
    let run = pipeline::run_ledger_with_cme(&config, now.date(), now)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.dataset, run.trade_date, &run.written)
    );

    let payload = crate::report::status_payload(&run.dataset, run.trade_date, run.explicit_date);
    let json = serde_json::to_string_pretty(&payload)
        .map_err(|e| AppError::new(ErrorKind::WriteFailure, format!("Failed to render status payload: {e}")))?;
    println!("{json}");

    Ok(())
}

fn handle_init(args: InitArgs) -> Result<(), AppError> {
    let paths = ledger_paths_from_args(&args.ledger);
    let sources = sources_from_args(&args.ledger)?;
    let written = crate::ledger::bootstrap::init_templates(&paths, &sources, args.months, args.force)?;
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn handle_sources(args: LedgerArgs) -> Result<(), AppError> {
    let sources = sources_from_args(&args)?;
    println!("{:<10} {:>8} {:<6} {:<9} {}", "code", "product", "style", "calendar", "origin");
    for s in &sources {
        println!(
            "{:<10} {:>8} {:<6} {:<9} {}",
            s.code,
            s.provider_id,
            format!("{:?}", s.decimal_style).to_lowercase(),
            if s.ignores_calendar_gate { "always" } else { "gated" },
            s.display_name
        );
    }
    Ok(())
}

fn handle_check_date(args: CheckDateArgs) -> Result<(), AppError> {
    if validate(args.date.trim()) {
        println!("{} is a valid MM/DD/YYYY date", args.date.trim());
        Ok(())
    } else {
        Err(AppError::new(
            ErrorKind::InvalidDateFormat,
            format!("'{}' is not a valid MM/DD/YYYY date", args.date),
        ))
    }
}

pub fn ledger_paths_from_args(args: &LedgerArgs) -> LedgerPaths {
    let defaults = LedgerPaths::in_dir(&args.ledger_dir);
    LedgerPaths {
        data_template: args.data_template.clone().unwrap_or(defaults.data_template),
        data_instance: args.data_instance.clone().unwrap_or(defaults.data_instance),
        resume_template: args.resume_template.clone().unwrap_or(defaults.resume_template),
        resume_instance: args.resume_instance.clone().unwrap_or(defaults.resume_instance),
    }
}

pub fn sources_from_args(args: &LedgerArgs) -> Result<Vec<Source>, AppError> {
    let sources = match &args.sources {
        Some(path) => load_sources(path)?,
        None => default_sources(),
    };
    catalog::validate_sources(&sources)?;
    Ok(sources)
}

pub fn run_config_from_args(args: &RunArgs) -> Result<RunConfig, AppError> {
    let exception_days = if args.exception_days.is_empty() {
        parse_exception_days(DEFAULT_EXCEPTION_DAYS)?
    } else {
        parse_exception_days(&args.exception_days)?
    };

    Ok(RunConfig {
        date: args.date.clone(),
        ledger: ledger_paths_from_args(&args.ledger),
        sources: sources_from_args(&args.ledger)?,
        exception_days,
        max_lookback_days: args.max_lookback_days,
        fetch_timeout: std::time::Duration::from_secs(args.fetch_timeout_secs),
        parallel_fetch: !args.sequential,
        base_url: args.base_url.clone(),
        date_format: args.ledger_date_format.clone(),
        dump_dir: args.dump_dir.clone(),
        export_resume: args.export_resume.clone(),
    })
}
