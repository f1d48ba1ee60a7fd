use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::metadata_keys;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    /// Transient failure; the retry scheduler may still requeue it.
    Failed,
    /// Retry budget exhausted. No further automatic processing.
    FailedPermanent,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::FailedPermanent => "failed_permanent",
        }
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            "failed_permanent" => Ok(ProcessingStatus::FailedPermanent),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Persisted photo record.
///
/// Created by the upload-URL step (status `pending`) or by the pipeline on
/// first sight of a storage event. The metadata map holds EXIF fields and, on
/// permanent failure, the failure diagnostics listed in
/// [`metadata_keys::FAILURE_KEYS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub gallery_id: String,
    pub file_name: String,
    pub original_key: String,
    pub optimized_key: String,
    pub thumbnail_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: i32,
    pub height: i32,
    pub processing_status: ProcessingStatus,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub favorite_count: i64,
    pub download_count: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Photo {
    /// A record that has not been processed yet.
    pub fn pending(
        id: impl Into<String>,
        gallery_id: impl Into<String>,
        file_name: impl Into<String>,
        original_key: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Photo {
            id: id.into(),
            gallery_id: gallery_id.into(),
            file_name: file_name.into(),
            original_key: original_key.into(),
            optimized_key: String::new(),
            thumbnail_key: String::new(),
            mime_type: String::new(),
            size_bytes: 0,
            width: 0,
            height: 0,
            processing_status: ProcessingStatus::Pending,
            uploaded_at,
            processed_at: None,
            favorite_count: 0,
            download_count: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.processing_status == ProcessingStatus::Completed
    }

    pub fn is_terminal_failure(&self) -> bool {
        self.processing_status == ProcessingStatus::FailedPermanent
    }

    /// Drop failure diagnostics left over from earlier attempts.
    pub fn clear_failure_diagnostics(&mut self) {
        for key in metadata_keys::FAILURE_KEYS {
            self.metadata.remove(key);
        }
    }
}
