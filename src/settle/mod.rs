//! Settlement retrieval: fetch with date fallback, normalize, aggregate.

pub mod aggregate;
pub mod fetcher;
pub mod normalize;

pub use aggregate::{AggregateOptions, run};
pub use fetcher::fetch_source;
pub use normalize::{Normalized, normalize};
