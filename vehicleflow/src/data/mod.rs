//! Raw data retrieval.
//!
//! This module provides:
//! - The tabular [`Dataset`] every stage exchanges through artifacts
//! - The [`DataSource`] contract with in-memory and JSON-lines backends
//! - Retry budgets for transient source failures

mod dataset;
mod retry;
mod source;

pub use dataset::{Cell, Dataset, DatasetError};
pub use retry::{
    with_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryExhausted, RetryingDataSource,
};
pub use source::{DataSource, InMemoryDataSource, JsonLinesDataSource, SourceError};

#[cfg(test)]
pub use source::MockDataSource;
