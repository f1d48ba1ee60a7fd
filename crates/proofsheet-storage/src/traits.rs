//! Storage abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Bucket-addressed blob storage.
///
/// Unlike a single-bucket store, every call names its bucket: the pipeline
/// reads from the bucket named in the upload event and writes to two fixed
/// rendition buckets.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object. A missing object is [`StorageError::NotFound`].
    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Write an object, replacing any existing one under the same key.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
