use async_trait::async_trait;
use proofsheet_core::Gallery;
use sqlx::{FromRow, PgPool, Postgres};

use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::GalleryRepository;

#[derive(Debug, FromRow)]
struct GalleryRow {
    id: String,
    name: String,
    photo_count: i64,
    enable_watermark: bool,
    watermark_text: String,
    watermark_position: String,
}

impl From<GalleryRow> for Gallery {
    fn from(row: GalleryRow) -> Self {
        Gallery {
            id: row.id,
            name: row.name,
            photo_count: row.photo_count,
            enable_watermark: row.enable_watermark,
            watermark_text: row.watermark_text,
            watermark_position: row.watermark_position,
        }
    }
}

/// Repository for gallery records
#[derive(Clone)]
pub struct PgGalleryRepository {
    pool: PgPool,
}

impl PgGalleryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GalleryRepository for PgGalleryRepository {
    #[tracing::instrument(skip(self), fields(db.table = "galleries", db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Gallery>> {
        let row = sqlx::query_as::<Postgres, GalleryRow>(
            "SELECT id, name, photo_count, enable_watermark, watermark_text, watermark_position \
             FROM galleries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Gallery::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "galleries", db.operation = "update", db.record_id = %id))]
    async fn increment_photo_count(&self, id: &str, delta: i64) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE galleries SET photo_count = photo_count + $2 WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
