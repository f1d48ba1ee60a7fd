//! Message handlers for the two consumers
//!
//! A handler decides what happens to a received message; the consumer acts
//! on that decision by deleting the message or leaving it to reappear.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proofsheet_core::{ObjectKey, RetryMetadata};
use proofsheet_db::PhotoRepository;
use proofsheet_processing::ProcessingPipeline;

use crate::bookkeeping::{mark_failed, mark_failed_permanent, FailureDiagnostics, MarkOutcome};
use crate::events::{parse_s3_event, ObjectRef};
use crate::queue::{MessageQueue, OutboundMessage, QueueMessage, MAX_VISIBILITY_TIMEOUT_SECONDS};
use crate::scheduler::RetryScheduler;

/// What the consumer should do with a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delete,
    /// Leave the message; it becomes visible again after its timeout.
    Retain,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &QueueMessage) -> Disposition;
}

#[derive(Debug)]
enum RecordFailure {
    Fatal(String),
    Retryable(String),
}

/// Runs the pipeline for every object in a processing-queue message and
/// routes retryable failures to the dead-letter queue.
pub struct ProcessingHandler {
    pipeline: Arc<ProcessingPipeline>,
    queue: Arc<dyn MessageQueue>,
    photos: Arc<dyn PhotoRepository>,
    queue_url: String,
    dlq_url: String,
    pipeline_timeout: Duration,
}

impl ProcessingHandler {
    pub fn new(
        pipeline: Arc<ProcessingPipeline>,
        queue: Arc<dyn MessageQueue>,
        photos: Arc<dyn PhotoRepository>,
        queue_url: impl Into<String>,
        dlq_url: impl Into<String>,
        pipeline_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            queue,
            photos,
            queue_url: queue_url.into(),
            dlq_url: dlq_url.into(),
            pipeline_timeout,
        }
    }

    #[tracing::instrument(skip(self, message, now), fields(message_id = %message.id))]
    pub async fn handle_at(&self, message: &QueueMessage, now: DateTime<Utc>) -> Disposition {
        let retry = RetryMetadata::from_attributes(&message.attributes);

        if let Some(not_before) = retry.not_before.filter(|t| *t > now) {
            return self.defer(message, not_before, now).await;
        }

        let objects = match parse_s3_event(&message.body) {
            Ok(objects) => objects,
            Err(e) => {
                tracing::error!(error = %e, "Dropping message with malformed body");
                return Disposition::Delete;
            }
        };
        if objects.is_empty() {
            tracing::debug!("Message carries no object records");
            return Disposition::Delete;
        }

        let mut retryable = Vec::new();
        for object in &objects {
            match self.process_object(object).await {
                Ok(()) => {}
                Err(RecordFailure::Fatal(reason)) => {
                    tracing::error!(bucket = %object.bucket, key = %object.key, error = %reason, "Processing failed permanently");
                    self.give_up(object, &retry, &reason, now).await;
                }
                Err(RecordFailure::Retryable(reason)) => {
                    tracing::warn!(
                        bucket = %object.bucket,
                        key = %object.key,
                        attempt = retry.attempt_number,
                        error = %reason,
                        "Processing failed, routing to dead-letter queue"
                    );
                    self.flag_failed(object, &reason).await;
                    retryable.push(reason);
                }
            }
        }

        if retryable.is_empty() {
            return Disposition::Delete;
        }
        self.dead_letter(message, retry, retryable.join("; ")).await
    }

    async fn process_object(&self, object: &ObjectRef) -> Result<(), RecordFailure> {
        let run = self.pipeline.process(&object.bucket, &object.key);
        match tokio::time::timeout(self.pipeline_timeout, run).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.is_retryable() => Err(RecordFailure::Retryable(e.to_string())),
            Ok(Err(e)) => Err(RecordFailure::Fatal(e.to_string())),
            Err(_) => Err(RecordFailure::Retryable(format!(
                "processing timed out after {}s",
                self.pipeline_timeout.as_secs()
            ))),
        }
    }

    async fn defer(
        &self,
        message: &QueueMessage,
        not_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Disposition {
        let wait = (not_before - now)
            .num_seconds()
            .clamp(1, MAX_VISIBILITY_TIMEOUT_SECONDS as i64) as i32;

        match self
            .queue
            .change_visibility(&self.queue_url, &message.receipt_handle, wait)
            .await
        {
            Ok(()) => tracing::debug!(delay_seconds = wait, "Message deferred until notBefore"),
            Err(e) => tracing::warn!(error = %e, "Failed to extend visibility of deferred message"),
        }
        Disposition::Retain
    }

    async fn dead_letter(
        &self,
        message: &QueueMessage,
        retry: RetryMetadata,
        error: String,
    ) -> Disposition {
        let outbound = OutboundMessage {
            body: message.body.clone(),
            attributes: retry.with_error(error).with_not_before(None).to_attributes(),
            delay_seconds: 0,
        };

        match self.queue.send(&self.dlq_url, outbound).await {
            Ok(()) => Disposition::Delete,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send to dead-letter queue, leaving message for redrive");
                Disposition::Retain
            }
        }
    }

    async fn flag_failed(&self, object: &ObjectRef, reason: &str) {
        let Ok(key) = ObjectKey::parse(&object.key) else {
            return;
        };
        if let Err(e) = mark_failed(self.photos.as_ref(), &key.photo_id, reason).await {
            tracing::warn!(photo_id = %key.photo_id, error = %e, "Failed to mark photo failed");
        }
    }

    async fn give_up(
        &self,
        object: &ObjectRef,
        retry: &RetryMetadata,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        let Ok(key) = ObjectKey::parse(&object.key) else {
            return;
        };
        let diagnostics = FailureDiagnostics {
            reason: reason.to_string(),
            attempts: retry.attempt_number,
            first_failed_at: retry.first_failed_at.unwrap_or(now),
            last_retry_at: retry.last_retry_at.unwrap_or(now),
        };

        match mark_failed_permanent(self.photos.as_ref(), &key.photo_id, &diagnostics).await {
            Ok(MarkOutcome::Updated) => {}
            Ok(MarkOutcome::NotFound) => {
                tracing::debug!(photo_id = %key.photo_id, "No photo record to mark");
            }
            Ok(MarkOutcome::Skipped) => {
                tracing::info!(photo_id = %key.photo_id, "Photo already completed, not marking it failed");
            }
            Err(e) => {
                tracing::error!(photo_id = %key.photo_id, error = %e, "Failed to mark photo permanently failed");
            }
        }
    }
}

#[async_trait]
impl MessageHandler for ProcessingHandler {
    async fn handle(&self, message: &QueueMessage) -> Disposition {
        self.handle_at(message, Utc::now()).await
    }
}

/// Hands dead-lettered messages to the retry scheduler.
pub struct DlqHandler {
    scheduler: Arc<RetryScheduler>,
}

impl DlqHandler {
    pub fn new(scheduler: Arc<RetryScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl MessageHandler for DlqHandler {
    async fn handle(&self, message: &QueueMessage) -> Disposition {
        if self.scheduler.handle(message).await.is_settled() {
            Disposition::Delete
        } else {
            Disposition::Retain
        }
    }
}
