//! Proofsheet Processing Library
//!
//! Turns an uploaded original into a thumbnail and an optimized rendition:
//!
//! - [`metadata`]: decoding for dimensions and best-effort EXIF extraction
//! - [`image`]: composable transformation strategies (resize, fill,
//!   watermark, filters)
//! - [`encoder`]: serialization of a transformed image to JPEG, PNG or WebP
//! - [`pipeline`]: the staged download-to-persist run for one object

pub mod encoder;
pub mod image;
pub mod metadata;
pub mod pipeline;

pub use encoder::{EncodeError, RenditionEncoder, RenditionFormat};
pub use self::image::{Transform, TransformChain, TransformError, WatermarkPosition, WatermarkSpec};
pub use metadata::{DecodeError, Extraction, MetadataExtractor, MetadataWarning};
pub use pipeline::{
    PipelineError, PipelineSettings, ProcessedPhoto, ProcessingContext, ProcessingPipeline, Stage,
    StageError,
};
