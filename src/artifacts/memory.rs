use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use super::{validate_key, Artifact, ArtifactError, ArtifactStore};
use crate::domain::value_objects::ArtifactHandle;

/// Keeps artifacts in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.blobs.read().await.len() }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<ArtifactHandle, ArtifactError> {
        validate_key(key)?;
        self.blobs.write().await.insert(key.to_string(), bytes);
        Ok(ArtifactHandle::new(key))
    }

    async fn retrieve(&self, handle: &ArtifactHandle) -> Result<Artifact, ArtifactError> {
        let blobs = self.blobs.read().await;
        let bytes = blobs.get(handle.as_str()).ok_or_else(|| ArtifactError::NotFound(handle.to_string()))?;
        Ok(Artifact::new(handle, bytes.clone()))
    }
}
