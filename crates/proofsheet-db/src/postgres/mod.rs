//! PostgreSQL repositories (sqlx)

mod gallery;
mod photo;

pub use gallery::PgGalleryRepository;
pub use photo::PgPhotoRepository;
