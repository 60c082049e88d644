//! Schema registry contract and implementations.

use super::{SchemaContract, SchemaDocument, SchemaLoadError};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Loads the schema contract for a pipeline run.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Loads and checks the contract.
    async fn load(&self) -> Result<SchemaContract, SchemaLoadError>;
}

/// Reads the contract from a JSON file on every load.
#[derive(Debug, Clone)]
pub struct JsonFileSchemaRegistry {
    path: PathBuf,
}

impl JsonFileSchemaRegistry {
    /// Creates a registry reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SchemaRegistry for JsonFileSchemaRegistry {
    async fn load(&self) -> Result<SchemaContract, SchemaLoadError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SchemaLoadError::Io {
                path: self.path.clone(),
                source,
            })?;
        let contract = SchemaContract::from_json(&raw)?;
        debug!(
            path = %self.path.display(),
            columns = contract.expected_column_count(),
            "Loaded schema contract"
        );
        Ok(contract)
    }
}

/// Serves a contract supplied in code.
#[derive(Debug, Clone)]
pub struct StaticSchemaRegistry {
    document: SchemaDocument,
}

impl StaticSchemaRegistry {
    /// Creates a registry serving `document`.
    #[must_use]
    pub fn new(document: SchemaDocument) -> Self {
        Self { document }
    }
}

#[async_trait]
impl SchemaRegistry for StaticSchemaRegistry {
    async fn load(&self) -> Result<SchemaContract, SchemaLoadError> {
        SchemaContract::from_document(self.document.clone())
    }
}
