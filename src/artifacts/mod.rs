//! Artifact storage for generated documents.

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

use async_trait::async_trait;
use thiserror::Error;
use crate::domain::value_objects::ArtifactHandle;

/// A stored document with the metadata needed to serve it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(handle: &ArtifactHandle, bytes: Vec<u8>) -> Self {
        let file_name = handle.file_name().to_string();
        let content_type = content_type_for(&file_name);
        Self { file_name, content_type, bytes }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key`, replacing whatever was there.
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<ArtifactHandle, ArtifactError>;

    async fn retrieve(&self, handle: &ArtifactHandle) -> Result<Artifact, ArtifactError>;
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact `{0}` not found")]
    NotFound(String),

    #[error("invalid artifact key `{0}`")]
    InvalidKey(String),

    #[error("artifact I/O failed")]
    Io(#[from] std::io::Error),
}

/// Keys are relative, `/`-separated paths without empty, `.` or `..` segments.
pub(crate) fn validate_key(key: &str) -> Result<(), ArtifactError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && key.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'));
    if valid { Ok(()) } else { Err(ArtifactError::InvalidKey(key.to_string())) }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
