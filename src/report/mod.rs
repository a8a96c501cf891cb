//! Reporting: run summary text and the JSON status payload.

pub mod format;

pub use format::*;
