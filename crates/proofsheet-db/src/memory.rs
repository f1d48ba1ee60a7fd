//! In-memory repositories
//!
//! Used when no `DATABASE_URL` is configured and as test doubles. Failures can
//! be injected to exercise the error paths of callers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use proofsheet_core::{Gallery, Photo};
use tokio::sync::RwLock;

use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::{GalleryRepository, PhotoRepository};

#[derive(Clone, Default)]
pub struct InMemoryPhotoRepository {
    photos: Arc<RwLock<HashMap<String, Photo>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemoryPhotoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, photo: Photo) {
        self.photos.write().await.insert(photo.id.clone(), photo);
    }

    pub async fn get(&self, id: &str) -> Option<Photo> {
        self.photos.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.photos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.photos.read().await.is_empty()
    }

    /// Make every operation fail with `message`. Pass `None` to clear.
    pub async fn set_failure(&self, message: Option<&str>) {
        *self.failure.write().await = message.map(str::to_string);
    }

    async fn check_failure(&self) -> RepositoryResult<()> {
        match self.failure.read().await.as_ref() {
            Some(message) => Err(RepositoryError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PhotoRepository for InMemoryPhotoRepository {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Photo>> {
        self.check_failure().await?;
        Ok(self.get(id).await)
    }

    async fn create(&self, photo: &Photo) -> RepositoryResult<()> {
        self.check_failure().await?;
        let mut photos = self.photos.write().await;
        if photos.contains_key(&photo.id) {
            return Err(RepositoryError::AlreadyExists(photo.id.clone()));
        }
        photos.insert(photo.id.clone(), photo.clone());
        Ok(())
    }

    async fn update(&self, photo: &Photo) -> RepositoryResult<()> {
        self.check_failure().await?;
        let mut photos = self.photos.write().await;
        match photos.get_mut(&photo.id) {
            Some(existing) => {
                *existing = photo.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(photo.id.clone())),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryGalleryRepository {
    galleries: Arc<RwLock<HashMap<String, Gallery>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemoryGalleryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, gallery: Gallery) {
        self.galleries
            .write()
            .await
            .insert(gallery.id.clone(), gallery);
    }

    pub async fn get(&self, id: &str) -> Option<Gallery> {
        self.galleries.read().await.get(id).cloned()
    }

    /// Make every operation fail with `message`. Pass `None` to clear.
    pub async fn set_failure(&self, message: Option<&str>) {
        *self.failure.write().await = message.map(str::to_string);
    }

    async fn check_failure(&self) -> RepositoryResult<()> {
        match self.failure.read().await.as_ref() {
            Some(message) => Err(RepositoryError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GalleryRepository for InMemoryGalleryRepository {
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Gallery>> {
        self.check_failure().await?;
        Ok(self.get(id).await)
    }

    async fn increment_photo_count(&self, id: &str, delta: i64) -> RepositoryResult<()> {
        self.check_failure().await?;
        let mut galleries = self.galleries.write().await;
        match galleries.get_mut(id) {
            Some(gallery) => {
                gallery.photo_count += delta;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }
}
