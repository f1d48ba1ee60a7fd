//! Failure bookkeeping on photo records
//!
//! Terminal bookkeeping is best-effort: callers log errors and carry on.
//! A `completed` record is never moved to a failure status, so a later failed
//! delivery of the same object (a duplicate, or a batched body whose other
//! records failed) cannot undo a finished run.

use chrono::{DateTime, Utc};
use proofsheet_core::constants::metadata_keys;
use proofsheet_core::{rfc3339, ProcessingStatus};
use proofsheet_db::{PhotoRepository, RepositoryResult};

/// Diagnostics recorded when a photo is given up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDiagnostics {
    pub reason: String,
    pub attempts: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_retry_at: DateTime<Utc>,
}

/// Result of a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Updated,
    NotFound,
    /// The record's current status does not allow the transition.
    Skipped,
}

/// Flag a transient failure. Records already `completed` or
/// `failed_permanent` keep their status.
#[tracing::instrument(skip_all, fields(photo_id = %photo_id))]
pub async fn mark_failed(
    photos: &dyn PhotoRepository,
    photo_id: &str,
    reason: &str,
) -> RepositoryResult<MarkOutcome> {
    let Some(mut photo) = photos.get_by_id(photo_id).await? else {
        return Ok(MarkOutcome::NotFound);
    };
    if photo.is_completed() || photo.is_terminal_failure() {
        return Ok(MarkOutcome::Skipped);
    }

    photo.processing_status = ProcessingStatus::Failed;
    photo
        .metadata
        .insert(metadata_keys::FAILURE_REASON.to_string(), reason.to_string());
    photos.update(&photo).await?;
    Ok(MarkOutcome::Updated)
}

/// Flag a photo as permanently failed and record why. Completed records are
/// left alone.
#[tracing::instrument(skip_all, fields(photo_id = %photo_id, attempts = diagnostics.attempts))]
pub async fn mark_failed_permanent(
    photos: &dyn PhotoRepository,
    photo_id: &str,
    diagnostics: &FailureDiagnostics,
) -> RepositoryResult<MarkOutcome> {
    let Some(mut photo) = photos.get_by_id(photo_id).await? else {
        return Ok(MarkOutcome::NotFound);
    };
    if photo.is_completed() {
        return Ok(MarkOutcome::Skipped);
    }

    photo.processing_status = ProcessingStatus::FailedPermanent;
    let entries = [
        (metadata_keys::FAILURE_REASON, diagnostics.reason.clone()),
        (metadata_keys::FAILURE_ATTEMPTS, diagnostics.attempts.to_string()),
        (metadata_keys::FIRST_FAILED_AT, rfc3339(diagnostics.first_failed_at)),
        (metadata_keys::LAST_RETRY_AT, rfc3339(diagnostics.last_retry_at)),
    ];
    for (key, value) in entries {
        photo.metadata.insert(key.to_string(), value);
    }
    photos.update(&photo).await?;
    Ok(MarkOutcome::Updated)
}
