//! Configuration module
//!
//! Configuration for the two worker binaries, read from the environment (and
//! an optional `.env` file). Every setting has a default except the queue URLs
//! and bucket names, which `validate()` checks for the selected backends.

use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_OPTIMIZED_MAX_HEIGHT,
    DEFAULT_OPTIMIZED_MAX_WIDTH, DEFAULT_THUMBNAIL_HEIGHT, DEFAULT_THUMBNAIL_WIDTH,
};
use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;
const MAX_WORKERS: usize = 4;
const RECEIVE_BATCH_SIZE: i32 = 10;
const RECEIVE_WAIT_SECONDS: i32 = 20;
const PIPELINE_TIMEOUT_SECS: u64 = 300;

/// Queue backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    Sqs,
    Memory,
}

impl FromStr for QueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqs" => Ok(QueueBackend::Sqs),
            "memory" => Ok(QueueBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid queue backend: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub optimized_bucket: String,
    pub thumbnail_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub local_storage_path: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// In-memory repositories are used when unset (outside production only).
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub processing_queue_url: String,
    pub dlq_url: String,
    pub sqs_endpoint: Option<String>, // LocalStack and other SQS-compatible services
    pub max_workers: usize,
    pub receive_batch_size: i32,
    pub receive_wait_seconds: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenditionConfig {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub optimized_max_width: u32,
    pub optimized_max_height: u32,
    pub jpeg_quality: u8,
}

impl Default for RenditionConfig {
    fn default() -> Self {
        RenditionConfig {
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            thumbnail_height: DEFAULT_THUMBNAIL_HEIGHT,
            optimized_max_width: DEFAULT_OPTIMIZED_MAX_WIDTH,
            optimized_max_height: DEFAULT_OPTIMIZED_MAX_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
        }
    }
}

/// Configuration shared by `photo-processor` and `dlq-reprocessor`.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub renditions: RenditionConfig,
    pub retry: RetryConfig,
    pub pipeline_timeout_secs: u64,
    pub environment: String,
    pub log_format: String,
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable lookup. Does not
    /// validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let parsed = |name: &str, default: u64| -> u64 {
            var(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };
        let queue_backend = match var("QUEUE_BACKEND") {
            Some(value) => value.parse::<QueueBackend>()?,
            None => QueueBackend::Sqs,
        };

        let jpeg_quality = var("JPEG_QUALITY")
            .map(|v| {
                v.trim()
                    .parse::<u8>()
                    .map_err(|_| anyhow::anyhow!("JPEG_QUALITY must be an integer in 1..=100"))
            })
            .transpose()?
            .unwrap_or(DEFAULT_JPEG_QUALITY);

        Ok(ProcessorConfig {
            storage: StorageConfig {
                backend: storage_backend,
                optimized_bucket: var("OPTIMIZED_BUCKET").unwrap_or_default(),
                thumbnail_bucket: var("THUMBNAIL_BUCKET").unwrap_or_default(),
                s3_region: var("S3_REGION").or_else(|| var("AWS_REGION")),
                s3_endpoint: var("S3_ENDPOINT"),
                local_storage_path: var("LOCAL_STORAGE_PATH"),
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL"),
                max_connections: parsed("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS as u64) as u32,
            },
            queue: QueueConfig {
                backend: queue_backend,
                processing_queue_url: var("PROCESSING_QUEUE_URL").unwrap_or_default(),
                dlq_url: var("DLQ_URL").unwrap_or_default(),
                sqs_endpoint: var("SQS_ENDPOINT"),
                max_workers: parsed("MAX_WORKERS", MAX_WORKERS as u64) as usize,
                receive_batch_size: parsed("RECEIVE_BATCH_SIZE", RECEIVE_BATCH_SIZE as u64) as i32,
                receive_wait_seconds: parsed("RECEIVE_WAIT_SECONDS", RECEIVE_WAIT_SECONDS as u64)
                    as i32,
            },
            renditions: RenditionConfig {
                thumbnail_width: parsed("THUMBNAIL_WIDTH", DEFAULT_THUMBNAIL_WIDTH as u64) as u32,
                thumbnail_height: parsed("THUMBNAIL_HEIGHT", DEFAULT_THUMBNAIL_HEIGHT as u64)
                    as u32,
                optimized_max_width: parsed(
                    "OPTIMIZED_MAX_WIDTH",
                    DEFAULT_OPTIMIZED_MAX_WIDTH as u64,
                ) as u32,
                optimized_max_height: parsed(
                    "OPTIMIZED_MAX_HEIGHT",
                    DEFAULT_OPTIMIZED_MAX_HEIGHT as u64,
                ) as u32,
                jpeg_quality,
            },
            retry: RetryConfig {
                max_attempts: parsed("MAX_RETRY_ATTEMPTS", DEFAULT_MAX_RETRY_ATTEMPTS as u64)
                    as u32,
            },
            pipeline_timeout_secs: parsed("PIPELINE_TIMEOUT_SECS", PIPELINE_TIMEOUT_SECS),
            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_format: var("LOG_FORMAT").unwrap_or_else(|| "text".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage.optimized_bucket.is_empty() || self.storage.thumbnail_bucket.is_empty() {
            return Err(anyhow::anyhow!(
                "OPTIMIZED_BUCKET and THUMBNAIL_BUCKET must be set"
            ));
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=memory is not allowed in production"
                    ));
                }
            }
        }

        match &self.database.url {
            Some(url) => {
                if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ));
                }
            }
            None if self.is_production() => {
                return Err(anyhow::anyhow!("DATABASE_URL must be set in production"));
            }
            None => {}
        }

        match self.queue.backend {
            QueueBackend::Sqs => {
                if self.queue.processing_queue_url.is_empty() || self.queue.dlq_url.is_empty() {
                    return Err(anyhow::anyhow!(
                        "PROCESSING_QUEUE_URL and DLQ_URL must be set when using SQS"
                    ));
                }
            }
            QueueBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "QUEUE_BACKEND=memory is not allowed in production"
                    ));
                }
            }
        }

        if self.queue.max_workers == 0 {
            return Err(anyhow::anyhow!("MAX_WORKERS must be at least 1"));
        }
        if !(1..=10).contains(&self.queue.receive_batch_size) {
            return Err(anyhow::anyhow!("RECEIVE_BATCH_SIZE must be between 1 and 10"));
        }
        if !(0..=20).contains(&self.queue.receive_wait_seconds) {
            return Err(anyhow::anyhow!(
                "RECEIVE_WAIT_SECONDS must be between 0 and 20"
            ));
        }
        if self.pipeline_timeout_secs == 0 {
            return Err(anyhow::anyhow!("PIPELINE_TIMEOUT_SECS must be positive"));
        }

        let r = &self.renditions;
        if r.thumbnail_width == 0
            || r.thumbnail_height == 0
            || r.optimized_max_width == 0
            || r.optimized_max_height == 0
        {
            return Err(anyhow::anyhow!("Rendition dimensions must be positive"));
        }
        if !(1..=100).contains(&r.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow::anyhow!("MAX_RETRY_ATTEMPTS must be at least 1"));
        }

        Ok(())
    }
}
