//! Image transformation strategies
//!
//! Each strategy is a variant of [`Transform`]; a [`TransformChain`] applies
//! several in order, threading each output into the next input.
//!
//! - resize: fit-within-bounds and fixed-size fill
//! - watermark: bitmap-font text overlay
//! - filters: grayscale, blur, sharpen

pub mod filters;
pub mod resize;
pub mod transform;
pub mod watermark;

pub use transform::{optimized_chain, thumbnail_chain, Transform, TransformChain, TransformError};
pub use watermark::{WatermarkPosition, WatermarkSpec};
