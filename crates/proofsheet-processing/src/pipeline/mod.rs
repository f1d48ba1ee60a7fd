//! Processing pipeline for one uploaded original
//!
//! Stages run strictly in [`Stage::ORDER`]; the first failure stops the run
//! and is reported with the stage it happened in. The pipeline itself never
//! retries: callers decide from [`PipelineError::is_retryable`].

mod context;
mod error;

pub use context::ProcessingContext;
pub use error::{PipelineError, Stage, StageError};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use proofsheet_core::{
    change_extension, ObjectKey, Photo, ProcessingStatus, ProcessorConfig, RenditionConfig,
    WatermarkSettings,
};
use proofsheet_db::{GalleryRepository, PhotoRepository, RepositoryError};
use proofsheet_storage::BlobStore;

use crate::encoder::{RenditionEncoder, RenditionFormat};
use crate::image::{optimized_chain, thumbnail_chain};
use crate::metadata::MetadataExtractor;

/// Where and how renditions are produced.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub optimized_bucket: String,
    pub thumbnail_bucket: String,
    pub renditions: RenditionConfig,
    pub format: RenditionFormat,
}

impl PipelineSettings {
    pub fn from_config(config: &ProcessorConfig) -> Self {
        PipelineSettings {
            optimized_bucket: config.storage.optimized_bucket.clone(),
            thumbnail_bucket: config.storage.thumbnail_bucket.clone(),
            renditions: config.renditions.clone(),
            format: RenditionFormat::Jpeg,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPhoto {
    pub photo_id: String,
    pub gallery_id: String,
    pub thumbnail_key: String,
    pub optimized_key: String,
    pub width: u32,
    pub height: u32,
    /// Whether this run created the photo record (and bumped the gallery count).
    pub created: bool,
}

pub struct ProcessingPipeline {
    storage: Arc<dyn BlobStore>,
    photos: Arc<dyn PhotoRepository>,
    galleries: Arc<dyn GalleryRepository>,
    settings: PipelineSettings,
}

impl ProcessingPipeline {
    pub fn new(
        storage: Arc<dyn BlobStore>,
        photos: Arc<dyn PhotoRepository>,
        galleries: Arc<dyn GalleryRepository>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            storage,
            photos,
            galleries,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process the original at `bucket`/`key` end to end.
    #[tracing::instrument(skip(self), fields(photo_id = tracing::field::Empty, gallery_id = tracing::field::Empty))]
    pub async fn process(&self, bucket: &str, key: &str) -> Result<ProcessedPhoto, PipelineError> {
        let object_key = ObjectKey::parse(key)?;
        let span = tracing::Span::current();
        span.record("photo_id", object_key.photo_id.as_str());
        span.record("gallery_id", object_key.gallery_id.as_str());

        let started = Instant::now();
        let watermark = self.load_watermark(&object_key.gallery_id).await;
        let rendition_key = change_extension(key, self.settings.format.extension());
        let mut ctx = ProcessingContext::new(bucket, key, object_key, rendition_key, watermark);

        for stage in Stage::ORDER {
            let stage_started = Instant::now();
            self.run_stage(stage, &mut ctx)
                .await
                .map_err(|source| PipelineError::Stage { stage, source })?;
            tracing::debug!(
                stage = %stage,
                duration_ms = stage_started.elapsed().as_secs_f64() * 1000.0,
                "Stage completed"
            );
        }

        tracing::info!(
            width = ctx.width,
            height = ctx.height,
            created = ctx.created_record,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Photo processed"
        );

        Ok(ProcessedPhoto {
            photo_id: ctx.key.photo_id.clone(),
            gallery_id: ctx.key.gallery_id.clone(),
            thumbnail_key: ctx.rendition_key.clone(),
            optimized_key: ctx.rendition_key.clone(),
            width: ctx.width,
            height: ctx.height,
            created: ctx.created_record,
        })
    }

    /// Gallery settings are optional context: a missing gallery or a failed
    /// lookup means no watermark.
    async fn load_watermark(&self, gallery_id: &str) -> Option<WatermarkSettings> {
        match self.galleries.get_by_id(gallery_id).await {
            Ok(Some(gallery)) => gallery.watermark(),
            Ok(None) => {
                tracing::debug!(gallery_id = %gallery_id, "Gallery not found, skipping watermark");
                None
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    gallery_id = %gallery_id,
                    "Gallery lookup failed, skipping watermark"
                );
                None
            }
        }
    }

    async fn run_stage(&self, stage: Stage, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        match stage {
            Stage::Download => self.download(ctx).await,
            Stage::Dimensions => self.dimensions(ctx).await,
            Stage::Metadata => self.metadata(ctx).await,
            Stage::Thumbnail => self.thumbnail(ctx).await,
            Stage::Optimized => self.optimized(ctx).await,
            Stage::Upload => self.upload(ctx).await,
            Stage::Persist => self.persist(ctx).await,
        }
    }

    async fn download(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        ctx.original = self.storage.download(&ctx.bucket, &ctx.raw_key).await?;
        ctx.mime_type = detect_mime_type(&ctx.original, &ctx.key.extension);
        Ok(())
    }

    async fn dimensions(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        let data = ctx.original.clone();
        let image = tokio::task::spawn_blocking(move || MetadataExtractor::decode(&data)).await??;

        ctx.width = image.width();
        ctx.height = image.height();
        ctx.image = Some(Arc::new(image));
        Ok(())
    }

    async fn metadata(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        let data = ctx.original.clone();
        let (mut metadata, warning) =
            tokio::task::spawn_blocking(move || MetadataExtractor::read_capture_metadata(&data))
                .await?;

        if let Some(warning) = &warning {
            tracing::warn!(warning = %warning, "Capture metadata unreadable, continuing without it");
        }

        metadata.fill_dimensions(ctx.width, ctx.height);
        ctx.width = metadata.width.unwrap_or(ctx.width);
        ctx.height = metadata.height.unwrap_or(ctx.height);
        ctx.metadata = metadata;
        ctx.metadata_warning = warning;
        Ok(())
    }

    async fn thumbnail(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        let image = ctx
            .image
            .clone()
            .ok_or(StageError::MissingInput("decoded image"))?;
        let chain = thumbnail_chain(&self.settings.renditions);
        let format = self.settings.format;
        let quality = self.settings.renditions.jpeg_quality;

        let bytes = tokio::task::spawn_blocking(move || -> Result<_, StageError> {
            let transformed = chain.apply(image.as_ref().clone())?;
            Ok(RenditionEncoder::encode(&transformed, format, quality)?)
        })
        .await??;

        ctx.thumbnail = Some(bytes);
        Ok(())
    }

    async fn optimized(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        let image = ctx
            .image
            .clone()
            .ok_or(StageError::MissingInput("decoded image"))?;
        let chain = optimized_chain(&self.settings.renditions, ctx.watermark.as_ref());
        let format = self.settings.format;
        let quality = self.settings.renditions.jpeg_quality;

        let bytes = tokio::task::spawn_blocking(move || -> Result<_, StageError> {
            let transformed = chain.apply(image.as_ref().clone())?;
            Ok(RenditionEncoder::encode(&transformed, format, quality)?)
        })
        .await??;

        ctx.optimized = Some(bytes);
        // The decoded original is no longer needed.
        ctx.image = None;
        Ok(())
    }

    async fn upload(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        let thumbnail = ctx
            .thumbnail
            .clone()
            .ok_or(StageError::MissingInput("thumbnail"))?;
        let optimized = ctx
            .optimized
            .clone()
            .ok_or(StageError::MissingInput("optimized rendition"))?;
        let content_type = self.settings.format.mime_type();

        self.storage
            .upload(
                &self.settings.thumbnail_bucket,
                &ctx.rendition_key,
                thumbnail,
                content_type,
            )
            .await?;
        self.storage
            .upload(
                &self.settings.optimized_bucket,
                &ctx.rendition_key,
                optimized,
                content_type,
            )
            .await?;
        Ok(())
    }

    async fn persist(&self, ctx: &mut ProcessingContext) -> Result<(), StageError> {
        if let Some(mut photo) = self.photos.get_by_id(ctx.photo_id()).await? {
            apply_results(&mut photo, ctx);
            self.photos.update(&photo).await?;
            ctx.created_record = false;
            return Ok(());
        }

        let mut photo = Photo::pending(
            ctx.key.photo_id.clone(),
            ctx.key.gallery_id.clone(),
            ctx.key.file_name.clone(),
            ctx.raw_key.clone(),
            Utc::now(),
        );
        apply_results(&mut photo, ctx);

        match self.photos.create(&photo).await {
            Ok(()) => {
                self.galleries
                    .increment_photo_count(ctx.gallery_id(), 1)
                    .await?;
                ctx.created_record = true;
            }
            Err(RepositoryError::AlreadyExists(_)) => {
                // Created concurrently by another delivery: update it instead.
                let mut existing = self
                    .photos
                    .get_by_id(ctx.photo_id())
                    .await?
                    .ok_or_else(|| RepositoryError::NotFound(ctx.photo_id().to_string()))?;
                apply_results(&mut existing, ctx);
                self.photos.update(&existing).await?;
                ctx.created_record = false;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Copy the run's results onto a photo record and mark it completed.
fn apply_results(photo: &mut Photo, ctx: &ProcessingContext) {
    photo.gallery_id = ctx.key.gallery_id.clone();
    photo.file_name = ctx.key.file_name.clone();
    photo.original_key = ctx.raw_key.clone();
    photo.optimized_key = ctx.rendition_key.clone();
    photo.thumbnail_key = ctx.rendition_key.clone();
    photo.mime_type = ctx.mime_type.clone();
    photo.size_bytes = ctx.original.len() as i64;
    photo.width = i32::try_from(ctx.width).unwrap_or(i32::MAX);
    photo.height = i32::try_from(ctx.height).unwrap_or(i32::MAX);
    photo.processing_status = ProcessingStatus::Completed;
    photo.processed_at = Some(Utc::now());

    photo.clear_failure_diagnostics();
    photo.metadata.extend(ctx.metadata.to_metadata_map());
}

/// MIME type from the content, falling back to the key's extension.
pub fn detect_mime_type(data: &[u8], extension: &str) -> String {
    if let Ok(format) = image::guess_format(data) {
        return format.to_mime_type().to_string();
    }
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
    .to_string()
}
