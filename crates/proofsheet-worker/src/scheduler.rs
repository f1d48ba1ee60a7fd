//! Dead-letter retry scheduler
//!
//! Each dead-lettered message is either re-enqueued to the processing queue
//! after a backoff delay or, once its retry budget is spent, its photos are
//! marked `failed_permanent`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use proofsheet_core::{ObjectKey, RetryMetadata};
use proofsheet_db::PhotoRepository;

use crate::bookkeeping::{mark_failed_permanent, FailureDiagnostics, MarkOutcome};
use crate::events::parse_s3_event;
use crate::queue::{MessageQueue, OutboundMessage, QueueMessage, MAX_DELAY_SECONDS};
use crate::retry::backoff_delay;

const UNKNOWN_ERROR: &str = "unknown error";

/// What the scheduler did with a dead-lettered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOutcome {
    /// Re-enqueued as attempt `attempt`, due after `delay`.
    Requeued { attempt: u32, delay: Duration },
    /// Retry budget exhausted; `photos` are the ids marked permanent.
    MarkedPermanent { photos: Vec<String> },
    /// Re-enqueue failed; the dead-letter message must stay.
    RequeueFailed,
}

impl SchedulerOutcome {
    /// Whether the dead-letter message can be deleted.
    pub fn is_settled(&self) -> bool {
        !matches!(self, SchedulerOutcome::RequeueFailed)
    }
}

pub struct RetryScheduler {
    queue: Arc<dyn MessageQueue>,
    photos: Arc<dyn PhotoRepository>,
    processing_queue_url: String,
    max_attempts: u32,
}

impl RetryScheduler {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        photos: Arc<dyn PhotoRepository>,
        processing_queue_url: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            queue,
            photos,
            processing_queue_url: processing_queue_url.into(),
            max_attempts,
        }
    }

    pub async fn handle(&self, message: &QueueMessage) -> SchedulerOutcome {
        self.handle_at(message, Utc::now()).await
    }

    /// Decide for `message` as of `now`.
    #[tracing::instrument(skip(self, message, now), fields(message_id = %message.id, attempt = tracing::field::Empty))]
    pub async fn handle_at(&self, message: &QueueMessage, now: DateTime<Utc>) -> SchedulerOutcome {
        let retry = RetryMetadata::from_attributes(&message.attributes);
        tracing::Span::current().record("attempt", retry.attempt_number);

        if retry.attempt_number >= self.max_attempts {
            let photos = self.mark_permanent(message, &retry, now).await;
            tracing::warn!(
                attempts = retry.attempt_number,
                photos = photos.len(),
                error = retry.error_message.as_deref().unwrap_or(UNKNOWN_ERROR),
                "Retry budget exhausted, marked permanently failed"
            );
            return SchedulerOutcome::MarkedPermanent { photos };
        }

        self.requeue(message, &retry, now).await
    }

    async fn requeue(
        &self,
        message: &QueueMessage,
        retry: &RetryMetadata,
        now: DateTime<Utc>,
    ) -> SchedulerOutcome {
        let delay = backoff_delay(retry.attempt_number);
        let max_delay = Duration::from_secs(MAX_DELAY_SECONDS as u64);

        // Delays past the queue's limit are sent at the limit; the consumer
        // defers the rest through `notBefore`.
        let (queue_delay, not_before) = if delay > max_delay {
            let deferred_until = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|d| now.checked_add_signed(d));
            (max_delay, deferred_until)
        } else {
            (delay, None)
        };

        let next = retry.next_attempt(now).with_not_before(not_before);
        let outbound = OutboundMessage {
            body: message.body.clone(),
            attributes: next.to_attributes(),
            delay_seconds: queue_delay.as_secs() as i32,
        };

        match self.queue.send(&self.processing_queue_url, outbound).await {
            Ok(()) => {
                tracing::info!(
                    attempt = next.attempt_number,
                    delay_seconds = delay.as_secs(),
                    deferred = not_before.is_some(),
                    "Message re-enqueued for retry"
                );
                SchedulerOutcome::Requeued {
                    attempt: next.attempt_number,
                    delay,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to re-enqueue message, leaving it on the DLQ");
                SchedulerOutcome::RequeueFailed
            }
        }
    }

    async fn mark_permanent(
        &self,
        message: &QueueMessage,
        retry: &RetryMetadata,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let objects = match parse_s3_event(&message.body) {
            Ok(objects) => objects,
            Err(e) => {
                tracing::error!(error = %e, "Cannot parse dead-lettered body, dropping it");
                return Vec::new();
            }
        };

        let diagnostics = FailureDiagnostics {
            reason: retry
                .error_message
                .clone()
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            attempts: retry.attempt_number,
            first_failed_at: retry.first_failed_at.unwrap_or(now),
            last_retry_at: retry.last_retry_at.unwrap_or(now),
        };

        let mut marked = Vec::new();
        for object in objects {
            let key = match ObjectKey::parse(&object.key) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(key = %object.key, error = %e, "Skipping malformed object key");
                    continue;
                }
            };

            match mark_failed_permanent(self.photos.as_ref(), &key.photo_id, &diagnostics).await {
                Ok(MarkOutcome::Updated) => marked.push(key.photo_id),
                Ok(MarkOutcome::NotFound) => {
                    tracing::warn!(photo_id = %key.photo_id, "Photo record not found, nothing to mark");
                }
                Ok(MarkOutcome::Skipped) => {
                    tracing::info!(photo_id = %key.photo_id, "Photo already completed, not marking it failed");
                }
                Err(e) => {
                    tracing::error!(photo_id = %key.photo_id, error = %e, "Failed to mark photo permanently failed");
                }
            }
        }
        marked
    }
}
