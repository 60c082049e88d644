//! Fault-injecting collaborators.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data::{DataSource, Dataset, SourceError};
use crate::registry::{FsModelRegistry, ModelRegistry, RegistryError};
use crate::utils::content_md5;

/// A source that is unreachable for its first `failures` fetches.
#[derive(Debug)]
pub struct FlakySource {
    dataset: Dataset,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakySource {
    /// Creates a source failing `failures` times before serving `dataset`.
    #[must_use]
    pub fn new(dataset: Dataset, failures: usize) -> Self {
        Self {
            dataset,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// A source that never recovers.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::new(Dataset::default(), usize::MAX)
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FlakySource {
    async fn fetch(&self, collection_id: &str) -> Result<Dataset, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SourceError::Unreachable {
                collection: collection_id.to_string(),
                message: format!("connection refused (attempt {})", call + 1),
            });
        }
        Ok(self.dataset.clone())
    }
}

/// A filesystem registry whose uploads die halfway through.
///
/// Reads go to the real registry, so a baseline published beforehand is
/// still served.
#[derive(Debug, Clone)]
pub struct FaultyModelRegistry {
    inner: FsModelRegistry,
}

impl FaultyModelRegistry {
    /// Wraps a registry rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: FsModelRegistry::new(root),
        }
    }
}

#[async_trait]
impl ModelRegistry for FaultyModelRegistry {
    async fn put(&self, model_bytes: &[u8], key: &str) -> Result<String, RegistryError> {
        let mut upload = self
            .inner
            .begin_upload(key, content_md5(model_bytes))
            .await?;
        upload.write(&model_bytes[..model_bytes.len() / 2]).await?;
        Err(RegistryError::Backend {
            key: key.to_string(),
            message: "connection reset during upload".to_string(),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        self.inner.get(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_source_recovers() {
        let source = FlakySource::new(Dataset::default(), 2);
        assert!(source.fetch("c").await.is_err());
        assert!(source.fetch("c").await.is_err());
        assert!(source.fetch("c").await.is_ok());
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_faulty_registry_leaves_previous_object() {
        let dir = tempfile::tempdir().unwrap();
        let good = FsModelRegistry::new(dir.path());
        good.put(b"old model", "models/m.json").await.unwrap();

        let faulty = FaultyModelRegistry::new(dir.path());
        let err = faulty.put(b"new model bytes", "models/m.json").await.unwrap_err();
        assert!(matches!(err, RegistryError::Backend { .. }));

        let stored = faulty.get("models/m.json").await.unwrap();
        assert_eq!(stored.as_deref(), Some(&b"old model"[..]));
        let leftovers = std::fs::read_dir(dir.path().join("models")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
