//! `settle-ledger` library crate.
//!
//! The binary (`settle`) is a thin wrapper around this library so that:
//!
//! - the fetch, normalize and ledger stages are testable without spawning processes
//! - the provider and document seams can be swapped (scripted providers in tests)

pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod ledger;
pub mod logging;
pub mod report;
pub mod settle;
