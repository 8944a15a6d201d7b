//! # gpubeat
//!
//! Collects GPU diagnostics from `nvidia-smi` and publishes them as
//! metric events.
//!
//! The work is split across the workspace:
//!
//! ```text
//! gpubeat-smi        run `nvidia-smi -q -x`, decode the XML report
//!      │
//!      ▼
//! gpubeat-sdk        flatten snapshots into events, tick, publish
//!      │
//!      ▼
//! gpubeat-types      event schema shared with consumers
//! ```
//!
//! This crate adds what the `gpubeat` binary needs on top: layered
//! configuration ([`config::Config`]) and duration parsing for config
//! values ([`duration::parse_duration`]).

pub mod config;
pub mod duration;

pub use config::{Config, OutputConfig, OutputKind, SmiConfig};
