//! Template ledgers: the document model, the writer and starter templates.

pub mod bootstrap;
pub mod document;
pub mod writer;

pub use document::{Document, Sheet, Workbook};
pub use writer::{LedgerPaths, WriteOptions, WriteSummary, write};
