//! Data source contract and the bundled implementations.

use super::{Dataset, DatasetError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while fetching from a data source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("collection '{collection}' unreachable: {message}")]
    Unreachable {
        /// Collection being fetched.
        collection: String,
        /// Backend message.
        message: String,
    },

    /// A record could not be decoded.
    #[error("malformed record {line} in collection '{collection}': {message}")]
    Malformed {
        /// Collection being fetched.
        collection: String,
        /// One-based record number.
        line: usize,
        /// Decoder message.
        message: String,
    },

    /// Reading the backing file failed.
    #[error("failed to read '{}'", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The records do not form a table.
    #[error(transparent)]
    Shape(#[from] DatasetError),

    /// Every attempt in the retry budget failed.
    #[error("gave up after {attempts} attempt(s)")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: usize,
        /// The last error observed.
        #[source]
        last: Box<SourceError>,
    },
}

impl SourceError {
    /// Returns true if retrying the fetch may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Io { .. })
    }
}

/// Retrieves raw records from an external store as a dataset.
///
/// Implementations do pure retrieval: no cleansing, no business rules.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches the full contents of a collection.
    async fn fetch(&self, collection_id: &str) -> Result<Dataset, SourceError>;
}

/// A data source backed by datasets held in memory.
///
/// Unknown collections yield an empty dataset, like a document store.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    collections: RwLock<HashMap<String, Dataset>>,
}

impl InMemoryDataSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a collection.
    #[must_use]
    pub fn with_collection(self, collection_id: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(collection_id, dataset);
        self
    }

    /// Adds or replaces a collection in place.
    pub fn insert(&self, collection_id: impl Into<String>, dataset: Dataset) {
        self.collections.write().insert(collection_id.into(), dataset);
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn fetch(&self, collection_id: &str) -> Result<Dataset, SourceError> {
        Ok(self
            .collections
            .read()
            .get(collection_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A data source reading document-store exports, one JSON object per line.
///
/// Collection `c` is read from `<dir>/c.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonLinesDataSource {
    dir: PathBuf,
}

impl JsonLinesDataSource {
    /// Creates a source rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the export file for a collection.
    #[must_use]
    pub fn collection_path(&self, collection_id: &str) -> PathBuf {
        self.dir.join(format!("{collection_id}.jsonl"))
    }

    fn parse(collection_id: &str, path: &Path, contents: &str) -> Result<Dataset, SourceError> {
        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value =
                serde_json::from_str(line).map_err(|e| SourceError::Malformed {
                    collection: collection_id.to_string(),
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            match value {
                serde_json::Value::Object(map) => records.push(map),
                other => {
                    return Err(SourceError::Malformed {
                        collection: collection_id.to_string(),
                        line: idx + 1,
                        message: format!("expected a JSON object, found {other}"),
                    })
                }
            }
        }
        debug!(path = %path.display(), records = records.len(), "Parsed collection export");
        Ok(Dataset::from_records(records))
    }
}

#[async_trait]
impl DataSource for JsonLinesDataSource {
    async fn fetch(&self, collection_id: &str) -> Result<Dataset, SourceError> {
        let path = self.collection_path(collection_id);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
        Self::parse(collection_id, &path, &contents)
    }
}
