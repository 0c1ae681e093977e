use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use super::{validate_key, Artifact, ArtifactError, ArtifactStore};
use uuid::Uuid;
use crate::domain::value_objects::ArtifactHandle;

/// Stores artifacts as files below a root directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, seg| path.join(seg)))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<ArtifactHandle, ArtifactError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never observe a half-written bill.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(key, bytes = bytes.len(), "artifact stored");
        Ok(ArtifactHandle::new(key))
    }

    async fn retrieve(&self, handle: &ArtifactHandle) -> Result<Artifact, ArtifactError> {
        let path = self.path_for(handle.as_str())?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Artifact::new(handle, bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ArtifactError::NotFound(handle.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
