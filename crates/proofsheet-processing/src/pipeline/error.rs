use std::fmt::{Display, Formatter, Result as FmtResult};

use proofsheet_core::CoreError;
use proofsheet_db::RepositoryError;
use proofsheet_storage::StorageError;

use crate::encoder::EncodeError;
use crate::image::TransformError;
use crate::metadata::DecodeError;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Dimensions,
    Metadata,
    Thumbnail,
    Optimized,
    Upload,
    Persist,
}

impl Stage {
    pub const ORDER: [Stage; 7] = [
        Stage::Download,
        Stage::Dimensions,
        Stage::Metadata,
        Stage::Thumbnail,
        Stage::Optimized,
        Stage::Upload,
        Stage::Persist,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Dimensions => "dimensions",
            Stage::Metadata => "metadata",
            Stage::Thumbnail => "thumbnail",
            Stage::Optimized => "optimized",
            Stage::Upload => "upload",
            Stage::Persist => "persist",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Blocking task failed: {0}")]
    Join(String),

    #[error("Missing {0} from an earlier stage")]
    MissingInput(&'static str),
}

impl From<tokio::task::JoinError> for StageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StageError::Join(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidKey(#[from] CoreError),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::InvalidKey(_) => None,
            PipelineError::Stage { stage, .. } => Some(*stage),
        }
    }

    /// Malformed input will fail the same way every time: an unparseable key
    /// or an undecodable image. An original missing at the download stage is
    /// also treated as fatal, which goes beyond those two cases; `NotFound`
    /// from any later stage stays retryable. Everything else may succeed on a
    /// later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::InvalidKey(_) => false,
            PipelineError::Stage { source, stage } => match source {
                StageError::Decode(_) => false,
                StageError::Storage(StorageError::NotFound(_)) => *stage != Stage::Download,
                StageError::Storage(StorageError::InvalidKey(_)) => false,
                _ => true,
            },
        }
    }
}
