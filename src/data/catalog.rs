//! Source catalog.
//!
//! The built-in set mirrors the CME products the ledger templates were laid
//! out for. A JSON file (array of `Source`) replaces it entirely.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use crate::domain::{DecimalStyle, Source};
use crate::error::{AppError, ErrorKind};

fn source(code: &str, display_name: &str, provider_id: &str, style: DecimalStyle, ignores_gate: bool) -> Source {
    Source {
        code: code.to_string(),
        display_name: display_name.to_string(),
        provider_id: provider_id.to_string(),
        decimal_style: style,
        ignores_calendar_gate: ignores_gate,
    }
}

/// Built-in CME sources.
///
/// Ethanol products follow the weekend/holiday gate; corn, RBOB and sugar
/// are fetched every run.
pub fn default_sources() -> Vec<Source> {
    vec![
        source("CU", "CMEGroup Chicago-CU", "4708", DecimalStyle::Dot, false),
        source("NYH", "CMEGroup New York-NYH", "4759", DecimalStyle::Dot, false),
        source("T2", "CMEGroup T2", "5187", DecimalStyle::Dot, false),
        source("CORN", "CMEGroup Corn", "300", DecimalStyle::Tick, true),
        source("RBOB", "CMEGroup RBob", "429", DecimalStyle::Dot, true),
        source("Sugar 11", "CMEGroup Sugar 11", "470", DecimalStyle::Dot, true),
    ]
}

/// Load sources from a JSON file.
pub fn load_sources(path: &Path) -> Result<Vec<Source>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            ErrorKind::Config,
            format!("Failed to open sources file '{}': {e}", path.display()),
        )
    })?;
    let sources: Vec<Source> = serde_json::from_reader(file)
        .map_err(|e| AppError::new(ErrorKind::Config, format!("Invalid sources file: {e}")))?;
    validate_sources(&sources)?;
    Ok(sources)
}

/// Codes must be unique and non-empty since they name ledger regions.
pub fn validate_sources(sources: &[Source]) -> Result<(), AppError> {
    if sources.is_empty() {
        return Err(AppError::new(ErrorKind::Config, "No sources configured."));
    }
    let mut seen = HashSet::new();
    for s in sources {
        if s.code.trim().is_empty() || s.provider_id.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Config,
                format!("Source '{}' needs a code and a provider id.", s.display_name),
            ));
        }
        if !seen.insert(s.code.as_str()) {
            return Err(AppError::new(
                ErrorKind::Config,
                format!("Duplicate source code '{}'.", s.code),
            ));
        }
    }
    Ok(())
}
