//! Proofsheet Infrastructure Library
//!
//! Cross-cutting process concerns shared by the worker binaries: tracing
//! subscriber setup and shutdown signal handling.

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod shutdown;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};

pub use shutdown::shutdown_signal;
