//! Filesystem-backed model registry.

use super::{ModelRegistry, RegistryError};
use crate::utils::content_md5;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stores each key as a file under a root directory.
///
/// Uploads are staged to a hidden temp object, checked against the caller's
/// content MD5 and only then renamed over the live key, so a reader sees
/// either the previous object or the complete new one.
#[derive(Debug, Clone)]
pub struct FsModelRegistry {
    root: PathBuf,
}

impl FsModelRegistry {
    /// Creates a registry rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The registry root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to its object path.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, RegistryError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(RegistryError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Opens a staged upload for `key` that will only commit bytes whose
    /// base64 MD5 equals `expected_md5`.
    pub async fn begin_upload(
        &self,
        key: &str,
        expected_md5: impl Into<String>,
    ) -> Result<StagedUpload, RegistryError> {
        let final_path = self.object_path(key)?;
        let parent = final_path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| RegistryError::Io {
                key: key.to_string(),
                source,
            })?;

        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{file_name}.{}.upload", Uuid::new_v4().simple()));
        let file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|source| RegistryError::Io {
                key: key.to_string(),
                source,
            })?;

        Ok(StagedUpload {
            key: key.to_string(),
            temp_path,
            final_path,
            expected_md5: expected_md5.into(),
            file: Some(file),
            committed: false,
        })
    }
}

/// An in-progress upload. Dropping it without committing discards the
/// staged bytes and leaves the live object untouched.
#[derive(Debug)]
pub struct StagedUpload {
    key: String,
    temp_path: PathBuf,
    final_path: PathBuf,
    expected_md5: String,
    file: Option<tokio::fs::File>,
    committed: bool,
}

impl StagedUpload {
    fn io(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            key: self.key.clone(),
            source,
        }
    }

    /// Appends bytes to the staged object.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), RegistryError> {
        let Some(file) = self.file.as_mut() else {
            return Err(RegistryError::Backend {
                key: self.key.clone(),
                message: "upload already closed".to_string(),
            });
        };
        if let Err(e) = file.write_all(bytes).await {
            return Err(self.io(e));
        }
        Ok(())
    }

    /// Verifies the staged bytes and atomically replaces the live object.
    ///
    /// Returns the object location.
    pub async fn commit(mut self) -> Result<String, RegistryError> {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush().await {
                return Err(self.io(e));
            }
            if let Err(e) = file.sync_all().await {
                return Err(self.io(e));
            }
        }

        let staged = match tokio::fs::read(&self.temp_path).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.io(e)),
        };
        let actual = content_md5(&staged);
        if actual != self.expected_md5 {
            return Err(RegistryError::ChecksumMismatch {
                key: self.key.clone(),
                expected: self.expected_md5.clone(),
                actual,
            });
        }

        if let Err(e) = tokio::fs::rename(&self.temp_path, &self.final_path).await {
            return Err(self.io(e));
        }
        self.committed = true;
        debug!(key = %self.key, bytes = staged.len(), "Committed model upload");
        Ok(self.final_path.display().to_string())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key = %self.key, error = %e, "Failed to discard staged upload");
                }
            }
        }
    }
}

#[async_trait]
impl ModelRegistry for FsModelRegistry {
    async fn put(&self, model_bytes: &[u8], key: &str) -> Result<String, RegistryError> {
        let mut upload = self.begin_upload(key, content_md5(model_bytes)).await?;
        upload.write(model_bytes).await?;
        upload.commit().await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RegistryError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}
