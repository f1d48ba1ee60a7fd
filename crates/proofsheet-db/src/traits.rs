use async_trait::async_trait;
use proofsheet_core::{Gallery, Photo};

use crate::error::RepositoryResult;

/// Photo record persistence.
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Photo>>;

    /// Insert a new record. Fails with `AlreadyExists` if the id is taken,
    /// leaving the stored record untouched.
    async fn create(&self, photo: &Photo) -> RepositoryResult<()>;

    /// Overwrite an existing record. Fails with `NotFound` if absent.
    async fn update(&self, photo: &Photo) -> RepositoryResult<()>;
}

/// Gallery record access.
#[async_trait]
pub trait GalleryRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Gallery>>;

    async fn increment_photo_count(&self, id: &str, delta: i64) -> RepositoryResult<()>;
}
