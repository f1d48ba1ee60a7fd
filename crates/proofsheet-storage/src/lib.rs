//! Proofsheet Storage Library
//!
//! Blob storage abstraction used by the photo pipeline: originals are read
//! from the upload bucket, renditions are written to the optimized and
//! thumbnail buckets. Implementations exist for S3 (and S3-compatible
//! providers), the local filesystem and process memory.
//!
//! # Key format
//!
//! Keys are passed through unchanged (`{galleryID}/{photoID}/{fileName}`).
//! Keys must not be empty, contain `..` or start with `/`.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::{MemoryStorage, StoredObject};
pub use proofsheet_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{BlobStore, StorageError, StorageResult};
