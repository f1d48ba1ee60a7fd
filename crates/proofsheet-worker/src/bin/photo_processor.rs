use std::sync::Arc;
use std::time::Duration;

use proofsheet_core::ProcessorConfig;
use proofsheet_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use proofsheet_worker::{
    shutdown_channel, Components, ConsumerSettings, ProcessingHandler, QueueConsumer,
    DEFAULT_LOG_FILTER,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = ProcessorConfig::from_env()?;
    init_telemetry(
        "photo-processor",
        LogFormat::parse(&config.log_format),
        DEFAULT_LOG_FILTER,
    )?;

    let components = Components::from_config(&config).await?;
    let pipeline = Arc::new(components.pipeline(&config));
    let handler = ProcessingHandler::new(
        pipeline,
        components.queue.clone(),
        components.photos.clone(),
        config.queue.processing_queue_url.clone(),
        config.queue.dlq_url.clone(),
        Duration::from_secs(config.pipeline_timeout_secs),
    );

    let consumer = QueueConsumer::new(
        "photo-processor",
        components.queue.clone(),
        Arc::new(handler),
        ConsumerSettings::processing(&config.queue),
    );
    consumer.run(shutdown_channel()).await;

    shutdown_telemetry().await;
    Ok(())
}
