//! Repositories for photo and gallery records
//!
//! The pipeline and the retry scheduler see persistence only through the
//! [`PhotoRepository`] and [`GalleryRepository`] traits. A PostgreSQL
//! implementation (sqlx) backs production; the in-memory implementation backs
//! local runs and tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{RepositoryError, RepositoryResult};
pub use memory::{InMemoryGalleryRepository, InMemoryPhotoRepository};
pub use postgres::{PgGalleryRepository, PgPhotoRepository};
pub use traits::{GalleryRepository, PhotoRepository};
