//! In-process model registry.

use super::{ModelRegistry, RegistryError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Keeps published objects in a shared concurrent map.
///
/// Clones share the same objects. Each `put` replaces the whole value in a
/// single map insert, so readers never observe a partial object.
#[derive(Debug, Clone, Default)]
pub struct InMemoryModelRegistry {
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object.
    #[must_use]
    pub fn with_object(self, key: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.objects.insert(key.into(), bytes);
        self
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
    async fn put(&self, model_bytes: &[u8], key: &str) -> Result<String, RegistryError> {
        if key.is_empty() {
            return Err(RegistryError::InvalidKey {
                key: key.to_string(),
            });
        }
        self.objects.insert(key.to_string(), model_bytes.to_vec());
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        Ok(self.objects.get(key).map(|v| v.value().clone()))
    }
}
