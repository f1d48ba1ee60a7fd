//! Error types module
//!
//! Errors raised by the domain layer itself: object-key parsing and decoding of
//! persisted enum values. Adapters (storage, repositories, queues) define their
//! own error enums at their boundaries.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid object key '{key}': {reason}")]
    InvalidObjectKey { key: String, reason: &'static str },

    #[error("Invalid processing status: {0}")]
    InvalidStatus(String),
}

impl CoreError {
    pub(crate) fn invalid_key(key: &str, reason: &'static str) -> Self {
        CoreError::InvalidObjectKey {
            key: key.to_string(),
            reason,
        }
    }
}
