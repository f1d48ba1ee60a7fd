use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use proofsheet_core::{ImageMetadata, ObjectKey, WatermarkSettings};

use crate::metadata::MetadataWarning;

/// State owned by one pipeline run and filled in stage by stage.
#[derive(Debug)]
pub struct ProcessingContext {
    pub bucket: String,
    pub key: ObjectKey,
    /// The key exactly as received.
    pub raw_key: String,
    /// Key both renditions are stored under.
    pub rendition_key: String,
    pub watermark: Option<WatermarkSettings>,

    pub original: Bytes,
    pub mime_type: String,
    /// Decoded original, shared read-only with the blocking rendition tasks.
    pub image: Option<Arc<DynamicImage>>,
    pub width: u32,
    pub height: u32,
    pub metadata: ImageMetadata,
    pub metadata_warning: Option<MetadataWarning>,

    pub thumbnail: Option<Bytes>,
    pub optimized: Option<Bytes>,

    /// Set by the persist stage: whether the record was created by this run.
    pub created_record: bool,
}

impl ProcessingContext {
    pub fn new(
        bucket: impl Into<String>,
        raw_key: impl Into<String>,
        key: ObjectKey,
        rendition_key: String,
        watermark: Option<WatermarkSettings>,
    ) -> Self {
        ProcessingContext {
            bucket: bucket.into(),
            key,
            raw_key: raw_key.into(),
            rendition_key,
            watermark,
            original: Bytes::new(),
            mime_type: String::new(),
            image: None,
            width: 0,
            height: 0,
            metadata: ImageMetadata::default(),
            metadata_warning: None,
            thumbnail: None,
            optimized: None,
            created_record: false,
        }
    }

    pub fn photo_id(&self) -> &str {
        &self.key.photo_id
    }

    pub fn gallery_id(&self) -> &str {
        &self.key.gallery_id
    }
}
