//! Long-polling queue consumer
//!
//! Receives batches from one queue and runs a [`MessageHandler`] for each
//! message on its own task, at most `max_workers` at a time. Batch size is
//! capped by the free worker count so received messages never wait for a
//! slot while their visibility timeout runs.
//!
//! Shutdown: a message on the shutdown channel (or its sender being dropped)
//! stops polling; in-flight messages are finished before [`QueueConsumer::run`]
//! returns.
//!
//! Each consumer holds its own `tracing::Dispatch` and attaches it to every
//! message task, so logs from handlers land in that handle rather than
//! whatever default happens to be set on the worker thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proofsheet_core::QueueConfig;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::handler::{Disposition, MessageHandler};
use crate::queue::{MessageQueue, QueueMessage, QueueResult, MAX_RECEIVE_BATCH};

/// Pause after a failed receive before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub queue_url: String,
    pub max_workers: usize,
    pub batch_size: i32,
    pub wait_seconds: i32,
}

impl ConsumerSettings {
    pub fn processing(config: &QueueConfig) -> Self {
        Self::for_queue(config, &config.processing_queue_url)
    }

    pub fn dead_letter(config: &QueueConfig) -> Self {
        Self::for_queue(config, &config.dlq_url)
    }

    fn for_queue(config: &QueueConfig, queue_url: &str) -> Self {
        ConsumerSettings {
            queue_url: queue_url.to_string(),
            max_workers: config.max_workers.max(1),
            batch_size: config.receive_batch_size.clamp(1, MAX_RECEIVE_BATCH),
            wait_seconds: config.receive_wait_seconds,
        }
    }
}

pub struct QueueConsumer {
    name: &'static str,
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn MessageHandler>,
    settings: ConsumerSettings,
    semaphore: Arc<Semaphore>,
    dispatch: Dispatch,
}

impl QueueConsumer {
    pub fn new(
        name: &'static str,
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn MessageHandler>,
        settings: ConsumerSettings,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.max_workers.max(1)));
        Self {
            name,
            queue,
            handler,
            settings,
            semaphore,
            dispatch: tracing::dispatcher::get_default(|current| current.clone()),
        }
    }

    /// Route everything logged while handling messages to `dispatch`
    /// instead of the default captured at construction.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            consumer = self.name,
            queue_url = %self.settings.queue_url,
            backend = self.queue.backend_type(),
            max_workers = self.settings.max_workers,
            batch_size = self.settings.batch_size,
            "Queue consumer started"
        );

        let mut tasks = JoinSet::new();
        loop {
            while let Some(result) = tasks.try_join_next() {
                self.log_join_result(result);
            }

            let available = self.semaphore.available_permits();
            if available == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    Some(result) = tasks.join_next() => {
                        self.log_join_result(result);
                        continue;
                    }
                }
            }

            let max = (available as i32).min(self.settings.batch_size);
            let received = tokio::select! {
                _ = shutdown_rx.recv() => break,
                received = self.queue.receive(&self.settings.queue_url, max, self.settings.wait_seconds) => received,
            };

            match received {
                Ok(messages) => self.dispatch(messages, &mut tasks),
                Err(e) => {
                    tracing::error!(consumer = self.name, error = %e, "Failed to receive messages");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!(
            consumer = self.name,
            in_flight = tasks.len(),
            "Queue consumer stopping, draining in-flight messages"
        );
        while let Some(result) = tasks.join_next().await {
            self.log_join_result(result);
        }
        tracing::info!(consumer = self.name, "Queue consumer stopped");
    }

    /// Receive one batch without waiting and handle it to completion.
    /// Returns the number of messages handled.
    pub async fn poll_once(&self) -> QueueResult<usize> {
        let messages = self
            .queue
            .receive(&self.settings.queue_url, self.settings.batch_size, 0)
            .await?;
        let count = messages.len();

        let mut tasks = JoinSet::new();
        for message in messages {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let (queue, handler, url) = self.task_parts();
            tasks.spawn(
                async move {
                    let _permit = permit;
                    Self::process_message(queue, handler, url, message).await;
                }
                .with_subscriber(self.dispatch.clone()),
            );
        }
        while let Some(result) = tasks.join_next().await {
            self.log_join_result(result);
        }
        Ok(count)
    }

    fn dispatch(&self, messages: Vec<QueueMessage>, tasks: &mut JoinSet<()>) {
        for message in messages {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    // Received more than the free workers; let it reappear.
                    tracing::warn!(consumer = self.name, message_id = %message.id, "No worker available, leaving message");
                    continue;
                }
            };
            let (queue, handler, url) = self.task_parts();
            tasks.spawn(
                async move {
                    let _permit = permit;
                    Self::process_message(queue, handler, url, message).await;
                }
                .with_subscriber(self.dispatch.clone()),
            );
        }
    }

    fn task_parts(&self) -> (Arc<dyn MessageQueue>, Arc<dyn MessageHandler>, String) {
        (
            self.queue.clone(),
            self.handler.clone(),
            self.settings.queue_url.clone(),
        )
    }

    async fn process_message(
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn MessageHandler>,
        queue_url: String,
        message: QueueMessage,
    ) {
        let started = Instant::now();
        let disposition = handler.handle(&message).await;

        match disposition {
            Disposition::Delete => {
                if let Err(e) = queue.delete(&queue_url, &message.receipt_handle).await {
                    tracing::error!(message_id = %message.id, error = %e, "Failed to delete handled message");
                }
            }
            Disposition::Retain => {
                tracing::debug!(message_id = %message.id, "Message retained on queue");
            }
        }

        tracing::debug!(
            message_id = %message.id,
            disposition = ?disposition,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Message handled"
        );
    }

    fn log_join_result(&self, result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result {
            tracing::error!(consumer = self.name, error = %e, "Message task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "memory://processing";

    /// Deletes bodies equal to "ok", retains everything else, and records the
    /// peak number of concurrent calls.
    #[derive(Default)]
    struct RecordingHandler {
        active: AtomicUsize,
        peak: AtomicUsize,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, message: &QueueMessage) -> Disposition {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.handled.fetch_add(1, Ordering::SeqCst);

            if message.body == "ok" {
                Disposition::Delete
            } else {
                Disposition::Retain
            }
        }
    }

    fn settings(max_workers: usize) -> ConsumerSettings {
        ConsumerSettings {
            queue_url: URL.to_string(),
            max_workers,
            batch_size: 10,
            wait_seconds: 0,
        }
    }

    #[tokio::test]
    async fn poll_once_applies_dispositions() {
        let queue = InMemoryQueue::new();
        queue.push(URL, "ok", HashMap::new()).await;
        queue.push(URL, "keep", HashMap::new()).await;
        let handler = Arc::new(RecordingHandler::default());
        let consumer = QueueConsumer::new("test", Arc::new(queue.clone()), handler.clone(), settings(4));

        assert_eq!(consumer.poll_once().await.unwrap(), 2);
        assert_eq!(queue.deleted_count(URL).await, 1);
        assert_eq!(queue.in_flight_count(URL).await, 1);
        assert_eq!(consumer.poll_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_max_workers() {
        let queue = InMemoryQueue::new();
        for _ in 0..8 {
            queue.push(URL, "ok", HashMap::new()).await;
        }
        let handler = Arc::new(RecordingHandler::default());
        let consumer = QueueConsumer::new("test", Arc::new(queue.clone()), handler.clone(), settings(3));

        assert_eq!(consumer.poll_once().await.unwrap(), 8);
        assert_eq!(handler.handled.load(Ordering::SeqCst), 8);
        assert!(handler.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(queue.deleted_count(URL).await, 8);
    }

    #[tokio::test]
    async fn run_drains_queue_and_stops_on_shutdown() {
        let queue = InMemoryQueue::new();
        for _ in 0..5 {
            queue.push(URL, "ok", HashMap::new()).await;
        }
        let handler = Arc::new(RecordingHandler::default());
        let consumer = Arc::new(QueueConsumer::new(
            "test",
            Arc::new(queue.clone()),
            handler.clone(),
            ConsumerSettings {
                wait_seconds: 1,
                ..settings(2)
            },
        ));

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let running = {
            let consumer = consumer.clone();
            tokio::spawn(async move { consumer.run(shutdown_rx).await })
        };

        for _ in 0..100 {
            if queue.deleted_count(URL).await == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown_tx.send(()).await.unwrap();
        running.await.unwrap();

        assert_eq!(queue.deleted_count(URL).await, 5);
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn message_tasks_log_to_the_injected_dispatch() {
        let queue = InMemoryQueue::new();
        queue.push(URL, "ok", HashMap::new()).await;

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let consumer = QueueConsumer::new(
            "test",
            Arc::new(queue.clone()),
            Arc::new(RecordingHandler::default()),
            settings(1),
        )
        .with_dispatch(Dispatch::new(subscriber));

        assert_eq!(consumer.poll_once().await.unwrap(), 1);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Message handled"), "{output}");
    }

    #[test]
    fn settings_follow_queue_config() {
        let config = QueueConfig {
            backend: proofsheet_core::QueueBackend::Memory,
            processing_queue_url: "p".to_string(),
            dlq_url: "d".to_string(),
            sqs_endpoint: None,
            max_workers: 0,
            receive_batch_size: 25,
            receive_wait_seconds: 20,
        };
        let processing = ConsumerSettings::processing(&config);
        assert_eq!(processing.queue_url, "p");
        assert_eq!(processing.max_workers, 1);
        assert_eq!(processing.batch_size, 10);
        assert_eq!(ConsumerSettings::dead_letter(&config).queue_url, "d");
    }
}
