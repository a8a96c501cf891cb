//! Output helpers.
//!
//! - per-source JSON snapshots for debugging (`export::write_snapshots`)
//! - resume CSV export (`export::write_resume_csv`)

pub mod export;

pub use export::*;
