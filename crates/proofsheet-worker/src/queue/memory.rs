//! In-memory queue
//!
//! Single-process stand-in for SQS. Messages move from visible to in-flight
//! on receive and stay in flight until deleted. Delays are recorded but not
//! enforced.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{
    MessageQueue, OutboundMessage, QueueError, QueueMessage, QueueResult, MAX_DELAY_SECONDS,
    MAX_RECEIVE_BATCH, MAX_VISIBILITY_TIMEOUT_SECONDS,
};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    body: String,
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct QueueState {
    visible: VecDeque<Entry>,
    in_flight: HashMap<String, Entry>,
    sent: Vec<OutboundMessage>,
    visibility_changes: Vec<i32>,
    deleted: usize,
    send_failure: Option<String>,
}

#[derive(Clone, Default)]
pub struct InMemoryQueue {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
    notify: Arc<Notify>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message as if produced upstream. Returns its id.
    pub async fn push(&self, queue_url: &str, body: &str, attributes: HashMap<String, String>) -> String {
        let id = format!("msg-{}", self.sequence.fetch_add(1, Ordering::Relaxed));
        self.queues
            .lock()
            .await
            .entry(queue_url.to_string())
            .or_default()
            .visible
            .push_back(Entry {
                id: id.clone(),
                body: body.to_string(),
                attributes,
            });
        self.notify.notify_waiters();
        id
    }

    /// Every message sent to `queue_url` through [`MessageQueue::send`], in order.
    pub async fn sent(&self, queue_url: &str) -> Vec<OutboundMessage> {
        self.with_state(queue_url, |s| s.sent.clone()).await
    }

    pub async fn visible_count(&self, queue_url: &str) -> usize {
        self.with_state(queue_url, |s| s.visible.len()).await
    }

    pub async fn in_flight_count(&self, queue_url: &str) -> usize {
        self.with_state(queue_url, |s| s.in_flight.len()).await
    }

    pub async fn deleted_count(&self, queue_url: &str) -> usize {
        self.with_state(queue_url, |s| s.deleted).await
    }

    /// Visibility timeouts requested for `queue_url`, in order.
    pub async fn visibility_changes(&self, queue_url: &str) -> Vec<i32> {
        self.with_state(queue_url, |s| s.visibility_changes.clone()).await
    }

    /// Make sends to `queue_url` fail with `message`. Pass `None` to clear.
    pub async fn set_send_failure(&self, queue_url: &str, message: Option<&str>) {
        self.queues
            .lock()
            .await
            .entry(queue_url.to_string())
            .or_default()
            .send_failure = message.map(str::to_string);
    }

    async fn with_state<T>(&self, queue_url: &str, f: impl FnOnce(&QueueState) -> T) -> T {
        let mut queues = self.queues.lock().await;
        f(queues.entry(queue_url.to_string()).or_default())
    }

    async fn take_visible(&self, queue_url: &str, max: usize) -> Vec<QueueMessage> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue_url.to_string()).or_default();

        let mut messages = Vec::new();
        while messages.len() < max {
            let Some(entry) = state.visible.pop_front() else {
                break;
            };
            let receipt_handle = format!(
                "{}-r{}",
                entry.id,
                self.sequence.fetch_add(1, Ordering::Relaxed)
            );
            messages.push(QueueMessage {
                id: entry.id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: entry.body.clone(),
                attributes: entry.attributes.clone(),
            });
            state.in_flight.insert(receipt_handle, entry);
        }
        messages
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>> {
        let max = max_messages.clamp(1, MAX_RECEIVE_BATCH) as usize;
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(wait_seconds.clamp(0, 20) as u64);

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let messages = self.take_visible(queue_url, max).await;
            if !messages.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(messages);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn send(&self, queue_url: &str, message: OutboundMessage) -> QueueResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue_url.to_string()).or_default();
        if let Some(failure) = &state.send_failure {
            return Err(QueueError::Send(failure.clone()));
        }

        let message = OutboundMessage {
            delay_seconds: message.delay_seconds.clamp(0, MAX_DELAY_SECONDS),
            ..message
        };
        let id = format!("msg-{}", self.sequence.fetch_add(1, Ordering::Relaxed));
        state.visible.push_back(Entry {
            id,
            body: message.body.clone(),
            attributes: message.attributes.clone(),
        });
        state.sent.push(message);
        drop(queues);

        self.notify.notify_waiters();
        Ok(())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> QueueResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue_url.to_string()).or_default();
        match state.in_flight.remove(receipt_handle) {
            Some(_) => {
                state.deleted += 1;
                Ok(())
            }
            None => Err(QueueError::Delete(format!(
                "receipt handle is invalid: {}",
                receipt_handle
            ))),
        }
    }

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> QueueResult<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue_url.to_string()).or_default();
        if !state.in_flight.contains_key(receipt_handle) {
            return Err(QueueError::Visibility(format!(
                "receipt handle is invalid: {}",
                receipt_handle
            )));
        }
        state
            .visibility_changes
            .push(timeout_seconds.clamp(0, MAX_VISIBILITY_TIMEOUT_SECONDS));
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
