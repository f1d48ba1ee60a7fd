#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use proofsheet_core::RenditionConfig;
use proofsheet_db::{InMemoryGalleryRepository, InMemoryPhotoRepository};
use proofsheet_processing::{PipelineSettings, ProcessingPipeline, RenditionFormat};
use proofsheet_storage::MemoryStorage;
use proofsheet_worker::{InMemoryQueue, ProcessingHandler, RetryScheduler};

pub const UPLOADS: &str = "uploads";
pub const OPTIMIZED: &str = "optimized";
pub const THUMBNAILS: &str = "thumbnails";
pub const PROCESSING_QUEUE: &str = "memory://photo-processing";
pub const DLQ: &str = "memory://photo-processing-dlq";
pub const MAX_ATTEMPTS: u32 = 5;

/// Every component wired to in-memory adapters.
pub struct TestEnv {
    pub storage: MemoryStorage,
    pub photos: InMemoryPhotoRepository,
    pub galleries: InMemoryGalleryRepository,
    pub queue: InMemoryQueue,
    pub pipeline: Arc<ProcessingPipeline>,
}

impl TestEnv {
    pub fn new() -> Self {
        let storage = MemoryStorage::new();
        let photos = InMemoryPhotoRepository::new();
        let galleries = InMemoryGalleryRepository::new();
        let queue = InMemoryQueue::new();
        let pipeline = Arc::new(ProcessingPipeline::new(
            Arc::new(storage.clone()),
            Arc::new(photos.clone()),
            Arc::new(galleries.clone()),
            PipelineSettings {
                optimized_bucket: OPTIMIZED.to_string(),
                thumbnail_bucket: THUMBNAILS.to_string(),
                renditions: RenditionConfig::default(),
                format: RenditionFormat::Jpeg,
            },
        ));

        Self {
            storage,
            photos,
            galleries,
            queue,
            pipeline,
        }
    }

    pub fn processing_handler(&self) -> ProcessingHandler {
        ProcessingHandler::new(
            self.pipeline.clone(),
            Arc::new(self.queue.clone()),
            Arc::new(self.photos.clone()),
            PROCESSING_QUEUE,
            DLQ,
            Duration::from_secs(60),
        )
    }

    pub fn scheduler(&self) -> RetryScheduler {
        RetryScheduler::new(
            Arc::new(self.queue.clone()),
            Arc::new(self.photos.clone()),
            PROCESSING_QUEUE,
            MAX_ATTEMPTS,
        )
    }
}
