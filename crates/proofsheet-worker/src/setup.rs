//! Adapter wiring from configuration

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use proofsheet_core::{DatabaseConfig, ProcessorConfig, QueueBackend};
use proofsheet_db::{
    GalleryRepository, InMemoryGalleryRepository, InMemoryPhotoRepository, PgGalleryRepository,
    PgPhotoRepository, PhotoRepository,
};
use proofsheet_processing::{PipelineSettings, ProcessingPipeline};
use proofsheet_storage::{create_blob_store, BlobStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::queue::{InMemoryQueue, MessageQueue, SqsQueue};

const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Shared clients every consumer draws from.
#[derive(Clone)]
pub struct Components {
    pub storage: Arc<dyn BlobStore>,
    pub photos: Arc<dyn PhotoRepository>,
    pub galleries: Arc<dyn GalleryRepository>,
    pub queue: Arc<dyn MessageQueue>,
}

impl Components {
    pub async fn from_config(config: &ProcessorConfig) -> Result<Self> {
        let storage = create_blob_store(&config.storage)
            .await
            .context("Failed to initialize blob store")?;
        tracing::info!(backend = %storage.backend_type(), "Blob store initialized");

        let (photos, galleries) = setup_repositories(&config.database).await?;
        let queue = setup_queue(config).await;

        Ok(Self {
            storage,
            photos,
            galleries,
            queue,
        })
    }

    pub fn pipeline(&self, config: &ProcessorConfig) -> ProcessingPipeline {
        ProcessingPipeline::new(
            self.storage.clone(),
            self.photos.clone(),
            self.galleries.clone(),
            PipelineSettings::from_config(config),
        )
    }
}

async fn setup_repositories(
    config: &DatabaseConfig,
) -> Result<(Arc<dyn PhotoRepository>, Arc<dyn GalleryRepository>)> {
    match config.url.as_deref() {
        Some(url) => {
            let pool = setup_database(url, config.max_connections).await?;
            Ok((
                Arc::new(PgPhotoRepository::new(pool.clone())),
                Arc::new(PgGalleryRepository::new(pool)),
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory repositories");
            Ok((
                Arc::new(InMemoryPhotoRepository::new()),
                Arc::new(InMemoryGalleryRepository::new()),
            ))
        }
    }
}

/// Connect the pool and run pending migrations.
pub async fn setup_database(url: &str, max_connections: u32) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(max_connections, "Database connected successfully");

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

async fn setup_queue(config: &ProcessorConfig) -> Arc<dyn MessageQueue> {
    match config.queue.backend {
        QueueBackend::Sqs => Arc::new(
            SqsQueue::new(
                config.storage.s3_region.clone(),
                config.queue.sqs_endpoint.clone(),
            )
            .await,
        ),
        QueueBackend::Memory => {
            tracing::warn!("Using in-memory queue; messages do not leave this process");
            Arc::new(InMemoryQueue::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofsheet_core::StorageBackend;
    use std::collections::HashMap;

    #[tokio::test]
    async fn builds_local_components_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = [
            ("STORAGE_BACKEND", "local".to_string()),
            ("LOCAL_STORAGE_PATH", dir.path().display().to_string()),
            ("OPTIMIZED_BUCKET", "optimized".to_string()),
            ("THUMBNAIL_BUCKET", "thumbnails".to_string()),
            ("QUEUE_BACKEND", "memory".to_string()),
        ]
        .into_iter()
        .collect();
        let config = ProcessorConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        config.validate().unwrap();

        let components = Components::from_config(&config).await.unwrap();
        assert_eq!(components.storage.backend_type(), StorageBackend::Local);
        assert_eq!(components.queue.backend_type(), "memory");

        let pipeline = components.pipeline(&config);
        assert_eq!(pipeline.settings().thumbnail_bucket, "thumbnails");
        assert_eq!(pipeline.settings().optimized_bucket, "optimized");
    }
}
