//! Proofsheet Worker Library
//!
//! Queue consumers for the photo pipeline: the processing consumer runs the
//! pipeline for every upload notification and dead-letters retryable
//! failures; the dead-letter consumer drives the retry scheduler.

pub mod bookkeeping;
pub mod consumer;
pub mod events;
pub mod handler;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod setup;

pub use consumer::{ConsumerSettings, QueueConsumer};
pub use events::{parse_s3_event, s3_event_body, ObjectRef};
pub use handler::{Disposition, DlqHandler, MessageHandler, ProcessingHandler};
pub use queue::{InMemoryQueue, MessageQueue, OutboundMessage, QueueError, QueueMessage, SqsQueue};
pub use retry::{backoff_delay, BACKOFF_SCHEDULE_SECS};
pub use scheduler::{RetryScheduler, SchedulerOutcome};
pub use setup::Components;

use tokio::sync::mpsc;

/// Default tracing directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "proofsheet=info";

/// Channel that fires once the process receives Ctrl+C or SIGTERM.
pub fn shutdown_channel() -> mpsc::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        proofsheet_infra::shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });
    shutdown_rx
}
