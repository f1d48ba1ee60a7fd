//! Message queue abstraction
//!
//! The consumers only need four operations from a queue: long-poll receive,
//! send (with per-message delay), delete by receipt handle and visibility
//! extension. SQS is the production backend; the in-memory queue backs tests
//! and local runs.

mod memory;
mod sqs;

pub use memory::InMemoryQueue;
pub use sqs::SqsQueue;

use std::collections::HashMap;

use async_trait::async_trait;

/// Largest per-message delay SQS accepts.
pub const MAX_DELAY_SECONDS: i32 = 900;

/// Largest visibility timeout SQS accepts (12 hours).
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: i32 = 43_200;

/// Largest batch a single receive may return.
pub const MAX_RECEIVE_BATCH: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("Visibility change failed: {0}")]
    Visibility(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// A received message. String-typed message attributes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
}

/// A message to enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: HashMap<String, String>,
    /// Clamped to `0..=MAX_DELAY_SECONDS` by the backends.
    pub delay_seconds: i32,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages`, waiting at most `wait_seconds`.
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>>;

    async fn send(&self, queue_url: &str, message: OutboundMessage) -> QueueResult<()>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> QueueResult<()>;

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> QueueResult<()>;

    fn backend_type(&self) -> &'static str;
}
