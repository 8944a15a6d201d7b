//! # gpubeat-types
//!
//! Event schema for GPU metrics collected by gpubeat. Every poll of the
//! diagnostic tool is flattened into independent [`Event`]s: one `gpu`
//! event per device and, optionally, one `gpu_process` event per process
//! holding device memory.
//!
//! ## Features
//!
//! - `serde`: JSON (or any serde format) serialization
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use gpubeat_types::{Event, GpuMetrics, GpuProcessMetrics};
//!
//! let gpu = Event::gpu(GpuMetrics {
//!     frame_buffer_total_mb: 16384.0,
//!     frame_buffer_used_mb: 384.0,
//!     process_count: 1,
//!     ..GpuMetrics::new("00000000:01:00.0")
//! });
//!
//! let process = Event::gpu_process(GpuProcessMetrics {
//!     gpu_id: "00000000:01:00.0".into(),
//!     process_id: "4242".into(),
//!     process: "python".into(),
//!     memory_used_mb: 380.0,
//! });
//!
//! assert_eq!(gpu.gpu_id(), process.gpu_id());
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. It is stamped on every event so
//! downstream pipelines can detect payload changes.

mod event;
mod field;
mod metrics;
mod version;

pub use event::*;
pub use field::*;
pub use metrics::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when renaming or removing payload fields.
pub const SCHEMA_VERSION: u32 = 1;
