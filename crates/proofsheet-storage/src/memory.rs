use crate::keys::validate_key;
use crate::traits::{BlobStore, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// In-process storage keyed by `(bucket, key)`.
///
/// Backs local runs without S3 and the test suites. Failures can be injected
/// per bucket to exercise retry paths.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    failing_buckets: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>, content_type: &str) {
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Make every operation on `bucket` fail with a backend error carrying
    /// `message`. Pass `None` to clear.
    pub async fn set_failure(&self, bucket: &str, message: Option<&str>) {
        let mut failing = self.failing_buckets.write().await;
        match message {
            Some(message) => {
                failing.insert(bucket.to_string(), message.to_string());
            }
            None => {
                failing.remove(bucket);
            }
        }
    }

    async fn injected_failure(&self, bucket: &str) -> StorageResult<()> {
        match self.failing_buckets.read().await.get(bucket) {
            Some(message) => Err(StorageError::BackendError(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.injected_failure(bucket).await?;

        self.get(bucket, key)
            .await
            .map(|object| object.data)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        validate_key(key)?;
        self.injected_failure(bucket).await?;

        self.insert(bucket, key, data, content_type).await;
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
