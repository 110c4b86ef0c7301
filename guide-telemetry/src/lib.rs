//! # guide-telemetry
//!
//! Structured logging and distributed tracing for the study guide pipeline.
//!
//! ## Usage
//!
//! ```rust
//! use guide_telemetry::{init_telemetry, info, stage_run_span};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry("study-guide")?;
//!
//!     let span = stage_run_span("OverviewAgent", "inv-1");
//!     let _enter = span.enter();
//!     info!("stage started");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Instrument, Span, debug, error, info, instrument, trace, warn};

pub use spans::*;

pub use init::{
    LogFormat, TelemetryConfig, init, init_telemetry, init_with_otlp, shutdown_telemetry,
};
