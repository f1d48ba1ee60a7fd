//! Data models for the photo pipeline
//!
//! Persisted records (photos, galleries), the metadata extracted from an
//! original, and the retry state carried on queue messages.

mod gallery;
mod metadata;
mod photo;
mod retry;

pub use gallery::*;
pub use metadata::*;
pub use photo::*;
pub use retry::*;
