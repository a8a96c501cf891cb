//! Upstream market-data access.
//!
//! - `SettlementProvider`: the fetch capability the pipeline depends on
//! - `cme`: the CME Group settlements client
//! - `catalog`: configured sources (built-in CME set or a JSON file)

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::RawPayload;

pub mod catalog;
pub mod cme;

pub use catalog::{default_sources, load_sources};
pub use cme::CmeClient;

/// Errors raised by a provider before a payload is available.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid provider response: {0}")]
    Decode(String),
}

/// Fetch one day of settlements for one provider product.
///
/// An empty day is not an error: it comes back as a payload with
/// `empty == true` (or no rows) and the caller decides what to do.
pub trait SettlementProvider: Sync {
    fn fetch(&self, provider_id: &str, date: NaiveDate) -> Result<RawPayload, FetchError>;
}
