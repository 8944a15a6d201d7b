//! # gpubeat-sdk
//!
//! Periodically runs `nvidia-smi`, flattens its report into GPU metric
//! events and publishes them to an output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpubeat_sdk::{Beater, Output};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     // Poll every 10 seconds and append events to a file
//!     let handle = Beater::builder()
//!         .output(Output::file("gpu-events.ndjson"))
//!         .period(Duration::from_secs(10))
//!         .build()
//!         .start();
//!
//!     // ... your application runs ...
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Stop polling and close the output
//!     handle.stop().await
//! }
//! ```
//!
//! ## Pieces
//!
//! - [`build_events`]: snapshot to events, no I/O
//! - [`Collector`]: one poll-parse-publish cycle
//! - [`Beater`]: runs the collector on a fixed tick with cooperative shutdown
//! - [`Output`] / [`Publisher`]: stdout, file, TCP or in-process channel

mod beater;
mod events;
mod output;

pub use beater::{Beater, BeaterBuilder, BeaterHandle, Collector, CycleReport, DEFAULT_PERIOD};
pub use events::{build_events, gpu_metrics, process_metrics, ProcessTracking};
pub use output::{Output, Publisher};

// Re-export types for convenience
pub use gpubeat_smi::{SmiCommand, SmiError, Snapshot};
pub use gpubeat_types::{Event, EventKind, EventPayload, GpuMetrics, GpuProcessMetrics};
