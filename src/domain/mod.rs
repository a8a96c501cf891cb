//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - source configuration (`Source`, `DecimalStyle`)
//! - raw provider payloads (`RawPayload`, `RawSettlementRow`)
//! - normalized per-source output (`NormalizedLine`, `PlaceholderLine`, `ResumeRow`)
//! - the per-run `Dataset` and ledger cells (`LedgerRow`, `Cell`)

pub mod types;

pub use types::*;
