use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proofsheet_core::{Photo, ProcessingStatus};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};

use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::PhotoRepository;

const PHOTO_COLUMNS: &str = "id, gallery_id, file_name, original_key, optimized_key, \
     thumbnail_key, mime_type, size_bytes, width, height, processing_status, uploaded_at, \
     processed_at, favorite_count, download_count, metadata";

#[derive(Debug, FromRow)]
struct PhotoRow {
    id: String,
    gallery_id: String,
    file_name: String,
    original_key: String,
    optimized_key: String,
    thumbnail_key: String,
    mime_type: String,
    size_bytes: i64,
    width: i32,
    height: i32,
    processing_status: String,
    uploaded_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    favorite_count: i64,
    download_count: i64,
    metadata: Json<HashMap<String, String>>,
}

impl TryFrom<PhotoRow> for Photo {
    type Error = RepositoryError;

    fn try_from(row: PhotoRow) -> Result<Self, Self::Error> {
        let processing_status = row
            .processing_status
            .parse::<ProcessingStatus>()
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

        Ok(Photo {
            id: row.id,
            gallery_id: row.gallery_id,
            file_name: row.file_name,
            original_key: row.original_key,
            optimized_key: row.optimized_key,
            thumbnail_key: row.thumbnail_key,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            width: row.width,
            height: row.height,
            processing_status,
            uploaded_at: row.uploaded_at,
            processed_at: row.processed_at,
            favorite_count: row.favorite_count,
            download_count: row.download_count,
            metadata: row.metadata.0,
        })
    }
}

/// Repository for photo records
#[derive(Clone)]
pub struct PgPhotoRepository {
    pool: PgPool,
}

impl PgPhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoRepository for PgPhotoRepository {
    #[tracing::instrument(skip(self), fields(db.table = "photos", db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Option<Photo>> {
        let row = sqlx::query_as::<Postgres, PhotoRow>(&format!(
            "SELECT {} FROM photos WHERE id = $1",
            PHOTO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Photo::try_from).transpose()
    }

    #[tracing::instrument(skip(self, photo), fields(db.table = "photos", db.operation = "insert", db.record_id = %photo.id))]
    async fn create(&self, photo: &Photo) -> RepositoryResult<()> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO photos ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO NOTHING
            "#,
            PHOTO_COLUMNS
        ))
        .bind(&photo.id)
        .bind(&photo.gallery_id)
        .bind(&photo.file_name)
        .bind(&photo.original_key)
        .bind(&photo.optimized_key)
        .bind(&photo.thumbnail_key)
        .bind(&photo.mime_type)
        .bind(photo.size_bytes)
        .bind(photo.width)
        .bind(photo.height)
        .bind(photo.processing_status.as_str())
        .bind(photo.uploaded_at)
        .bind(photo.processed_at)
        .bind(photo.favorite_count)
        .bind(photo.download_count)
        .bind(Json(&photo.metadata))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::AlreadyExists(photo.id.clone()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, photo), fields(db.table = "photos", db.operation = "update", db.record_id = %photo.id))]
    async fn update(&self, photo: &Photo) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE photos
            SET gallery_id = $2,
                file_name = $3,
                original_key = $4,
                optimized_key = $5,
                thumbnail_key = $6,
                mime_type = $7,
                size_bytes = $8,
                width = $9,
                height = $10,
                processing_status = $11,
                processed_at = $12,
                metadata = $13
            WHERE id = $1
            "#,
        )
        .bind(&photo.id)
        .bind(&photo.gallery_id)
        .bind(&photo.file_name)
        .bind(&photo.original_key)
        .bind(&photo.optimized_key)
        .bind(&photo.thumbnail_key)
        .bind(&photo.mime_type)
        .bind(photo.size_bytes)
        .bind(photo.width)
        .bind(photo.height)
        .bind(photo.processing_status.as_str())
        .bind(photo.processed_at)
        .bind(Json(&photo.metadata))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(photo.id.clone()));
        }
        Ok(())
    }
}
