//! Durable storage for published models.

mod fs;
mod memory;

pub use fs::{FsModelRegistry, StagedUpload};
pub use memory::InMemoryModelRegistry;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a model registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The key cannot name an object.
    #[error("invalid registry key '{key}'")]
    InvalidKey {
        /// Offending key.
        key: String,
    },

    /// Storage I/O failed.
    #[error("registry I/O failed for '{key}'")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The staged bytes do not match the declared checksum.
    #[error("checksum mismatch for '{key}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Key being written.
        key: String,
        /// Declared base64 MD5.
        expected: String,
        /// Computed base64 MD5.
        actual: String,
    },

    /// The backend reported a failure.
    #[error("registry backend failed for '{key}': {message}")]
    Backend {
        /// Key being accessed.
        key: String,
        /// Backend message.
        message: String,
    },
}

/// Object storage for serialized model bundles.
///
/// `put` must be atomic per key: a concurrent or later `get` returns either
/// the previous object or the complete new one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Stores `model_bytes` under `key`, returning the object location.
    async fn put(&self, model_bytes: &[u8], key: &str) -> Result<String, RegistryError>;

    /// Fetches the object under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError>;
}
