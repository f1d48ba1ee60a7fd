//! Proofsheet Core Library
//!
//! This crate provides the domain models, object-key parsing, configuration and
//! error types shared by every Proofsheet component: the processing pipeline,
//! the storage and repository adapters, and the queue workers.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod object_key;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    DatabaseConfig, ProcessorConfig, QueueBackend, QueueConfig, RenditionConfig, RetryConfig,
    StorageConfig,
};
pub use error::CoreError;
pub use models::{
    rfc3339, Gallery, GpsCoordinates, ImageMetadata, Photo, ProcessingStatus, RetryMetadata,
    WatermarkSettings,
};
pub use object_key::{change_extension, rendition_key, ObjectKey};
pub use storage_types::StorageBackend;
