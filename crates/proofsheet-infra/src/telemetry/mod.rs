//! Telemetry module
//!
//! Structured logging through `tracing`. The filter comes from `RUST_LOG` when
//! set, else from the caller's default directive.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, LogFormat};

/// Host name reported in the startup log line.
pub(crate) fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
