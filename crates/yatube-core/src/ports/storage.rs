//! Media storage port - where uploaded images end up.

use async_trait::async_trait;

use crate::forms::ImageUpload;

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store an upload under `dir` and return its path relative to the media root.
    async fn save(&self, dir: &str, upload: &ImageUpload) -> Result<String, StorageError>;

    /// Remove a stored file. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Public URL of a stored path.
    fn url(&self, path: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
