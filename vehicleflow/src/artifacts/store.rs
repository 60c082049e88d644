//! Run-scoped durable storage for artifacts and their payloads.

use crate::core::{RunId, StageName};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::trace;
use uuid::Uuid;

/// Errors raised by the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("artifact I/O failed at '{}'", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded or decoded.
    #[error("artifact at '{}' could not be (de)serialized", path.display())]
    Serialization {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes artifacts under `<root>/<run_id>/<stage>/`.
///
/// Every write goes to a uniquely named sibling temp file which is then
/// renamed into place, so a reader sees either nothing or a complete file.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    run_id: RunId,
    run_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates the run directory under `root`.
    pub async fn create(root: impl AsRef<Path>, run_id: RunId) -> Result<Self, StoreError> {
        let run_dir = root.as_ref().join(run_id.as_str());
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|e| StoreError::io(&run_dir, e))?;
        Ok(Self { run_id, run_dir })
    }

    /// The run this store belongs to.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// The directory holding one stage's outputs.
    #[must_use]
    pub fn stage_dir(&self, stage: StageName) -> PathBuf {
        self.run_dir.join(stage.as_str())
    }

    /// Serializes `value` as compact JSON into the stage directory.
    pub async fn write_json<T>(
        &self,
        stage: StageName,
        file: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.stage_dir(stage).join(file);
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Serialization {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    /// Serializes `value` as indented JSON into the stage directory.
    pub async fn write_json_pretty<T>(
        &self,
        stage: StageName,
        file: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.stage_dir(stage).join(file);
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
                path: path.clone(),
                source,
            })?;
        write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    /// Writes raw bytes into the stage directory.
    pub async fn write_bytes(
        &self,
        stage: StageName,
        file: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.stage_dir(stage).join(file);
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Writes indented JSON at the top of the run directory.
    pub async fn write_run_file<T>(&self, file: &str, value: &T) -> Result<PathBuf, StoreError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.run_dir.join(file);
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
                path: path.clone(),
                source,
            })?;
        write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    /// Reads and decodes a JSON file written by any store.
    pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
        let bytes = Self::read_bytes(path).await?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads a file written by any store.
    pub async fn read_bytes(path: &Path) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }

    trace!(path = %path.display(), bytes = bytes.len(), "Wrote artifact file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        rows: usize,
    }

    async fn store(dir: &Path) -> ArtifactStore {
        ArtifactStore::create(dir, RunId::from_string("run-1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_layout_is_run_and_stage_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let path = store
            .write_json(StageName::Ingestion, "train.json", &[1, 2, 3])
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("run-1").join("ingestion").join("train.json"));
        assert_eq!(store.run_id().as_str(), "run-1");
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let record = Record {
            name: "a".into(),
            rows: 3,
        };

        let path = store
            .write_json_pretty(StageName::Validation, "artifact.json", &record)
            .await
            .unwrap();
        let back: Record = ArtifactStore::read_json(&path).await.unwrap();
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        store
            .write_bytes(StageName::Training, "model.json", b"old")
            .await
            .unwrap();
        let path = store
            .write_bytes(StageName::Training, "model.json", b"new")
            .await
            .unwrap();

        assert_eq!(ArtifactStore::read_bytes(&path).await.unwrap(), b"new");
        let entries: Vec<_> = std::fs::read_dir(store.stage_dir(StageName::Training))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::read_bytes(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn test_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let path = store
            .write_bytes(StageName::Training, "bad.json", b"{")
            .await
            .unwrap();
        let err = ArtifactStore::read_json::<Record>(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }
}
