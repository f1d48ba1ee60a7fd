use std::sync::Arc;

use proofsheet_core::ProcessorConfig;
use proofsheet_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use proofsheet_worker::{
    shutdown_channel, Components, ConsumerSettings, DlqHandler, QueueConsumer, RetryScheduler,
    DEFAULT_LOG_FILTER,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = ProcessorConfig::from_env()?;
    init_telemetry(
        "dlq-reprocessor",
        LogFormat::parse(&config.log_format),
        DEFAULT_LOG_FILTER,
    )?;

    let components = Components::from_config(&config).await?;
    let scheduler = RetryScheduler::new(
        components.queue.clone(),
        components.photos.clone(),
        config.queue.processing_queue_url.clone(),
        config.retry.max_attempts,
    );

    let consumer = QueueConsumer::new(
        "dlq-reprocessor",
        components.queue.clone(),
        Arc::new(DlqHandler::new(Arc::new(scheduler))),
        ConsumerSettings::dead_letter(&config.queue),
    );
    consumer.run(shutdown_channel()).await;

    shutdown_telemetry().await;
    Ok(())
}
