//! Event - one flattened, timestamped record handed to a publisher.

use crate::{Fields, GpuMetrics, GpuProcessMetrics, SchemaVersion};

/// Type tag carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum EventKind {
    /// Per-device memory and utilization.
    #[cfg_attr(feature = "minicbor", n(0))]
    Gpu,
    /// Per-process memory on a device.
    #[cfg_attr(feature = "minicbor", n(1))]
    GpuProcess,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Gpu => "gpu",
            EventKind::GpuProcess => "gpu_process",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed body of an event. Serialized under a key named after the event kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub enum EventPayload {
    #[cfg_attr(feature = "minicbor", n(0))]
    Gpu(#[cfg_attr(feature = "minicbor", n(0))] GpuMetrics),
    #[cfg_attr(feature = "minicbor", n(1))]
    GpuProcess(#[cfg_attr(feature = "minicbor", n(0))] GpuProcessMetrics),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Gpu(_) => EventKind::Gpu,
            EventPayload::GpuProcess(_) => EventKind::GpuProcess,
        }
    }
}

/// A single GPU metric event.
///
/// Events are built once per device (and per process) on every poll and are
/// never modified afterwards. `kind` always agrees with `payload`; use the
/// constructors rather than assembling the struct by hand.
///
/// # Example
///
/// ```rust
/// use gpubeat_types::{Event, EventKind, GpuMetrics};
///
/// let event = Event::gpu(GpuMetrics::new("00000000:01:00.0"));
/// assert_eq!(event.kind, EventKind::Gpu);
/// assert_eq!(event.fields()["id"].as_str(), Some("00000000:01:00.0"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct Event {
    /// Schema version for downstream compatibility checks.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when this event was built.
    #[cfg_attr(feature = "serde", serde(rename = "@timestamp"))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub kind: EventKind,

    #[cfg_attr(feature = "serde", serde(flatten))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub payload: EventPayload,
}

impl Event {
    /// Create a `gpu` event stamped with the current time.
    pub fn gpu(metrics: GpuMetrics) -> Self {
        Self::with_timestamp(current_timestamp_ms(), EventPayload::Gpu(metrics))
    }

    /// Create a `gpu_process` event stamped with the current time.
    pub fn gpu_process(metrics: GpuProcessMetrics) -> Self {
        Self::with_timestamp(
            current_timestamp_ms(),
            EventPayload::GpuProcess(metrics),
        )
    }

    /// Create an event with a specific timestamp.
    pub fn with_timestamp(timestamp_ms: u64, payload: EventPayload) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            kind: payload.kind(),
            payload,
        }
    }

    /// Identifier of the device this event describes.
    pub fn gpu_id(&self) -> &str {
        match &self.payload {
            EventPayload::Gpu(m) => &m.id,
            EventPayload::GpuProcess(p) => &p.gpu_id,
        }
    }

    /// Flattened payload fields keyed by name.
    pub fn fields(&self) -> Fields {
        match &self.payload {
            EventPayload::Gpu(m) => m.fields(),
            EventPayload::GpuProcess(p) => p.fields(),
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
