//! Typed event payloads.

use crate::{FieldValue, Fields};

/// Memory and utilization metrics for one GPU at one point in time.
///
/// Memory values are in the scale reported by the diagnostic tool
/// (conventionally MiB); utilizations are percentages.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct GpuMetrics {
    /// Device identifier as reported by the tool (PCI bus id).
    #[cfg_attr(feature = "minicbor", n(0))]
    pub id: String,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub frame_buffer_total_mb: f64,

    #[cfg_attr(feature = "minicbor", n(2))]
    pub frame_buffer_free_mb: f64,

    #[cfg_attr(feature = "minicbor", n(3))]
    pub frame_buffer_used_mb: f64,

    #[cfg_attr(feature = "minicbor", n(4))]
    pub bar1_total_mb: f64,

    #[cfg_attr(feature = "minicbor", n(5))]
    pub bar1_free_mb: f64,

    #[cfg_attr(feature = "minicbor", n(6))]
    pub bar1_used_mb: f64,

    /// GPU core utilization over the tool's sample window.
    #[cfg_attr(feature = "minicbor", n(7))]
    pub processor_utilization_pct: f64,

    /// Memory controller utilization over the tool's sample window.
    #[cfg_attr(feature = "minicbor", n(8))]
    pub memory_utilization_pct: f64,

    /// Number of processes the tool reported on this device.
    #[cfg_attr(feature = "minicbor", n(9))]
    pub process_count: u64,
}

impl GpuMetrics {
    /// Create zeroed metrics for a device.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id".into(), FieldValue::from(self.id.as_str()));
        fields.insert(
            "frame_buffer_total_mb".into(),
            self.frame_buffer_total_mb.into(),
        );
        fields.insert(
            "frame_buffer_free_mb".into(),
            self.frame_buffer_free_mb.into(),
        );
        fields.insert(
            "frame_buffer_used_mb".into(),
            self.frame_buffer_used_mb.into(),
        );
        fields.insert("bar1_total_mb".into(), self.bar1_total_mb.into());
        fields.insert("bar1_free_mb".into(), self.bar1_free_mb.into());
        fields.insert("bar1_used_mb".into(), self.bar1_used_mb.into());
        fields.insert(
            "processor_utilization_pct".into(),
            self.processor_utilization_pct.into(),
        );
        fields.insert(
            "memory_utilization_pct".into(),
            self.memory_utilization_pct.into(),
        );
        fields.insert("process_count".into(), self.process_count.into());
        fields
    }
}

/// One process holding memory on a GPU.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct GpuProcessMetrics {
    /// Identifier of the device the process runs on.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub gpu_id: String,

    /// Process id, kept as reported (the tool may print `N/A` in containers).
    #[cfg_attr(feature = "minicbor", n(1))]
    pub process_id: String,

    /// Process name or command path.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub process: String,

    #[cfg_attr(feature = "minicbor", n(3))]
    pub memory_used_mb: f64,
}

impl GpuProcessMetrics {
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("gpu_id".into(), FieldValue::from(self.gpu_id.as_str()));
        fields.insert(
            "process_id".into(),
            FieldValue::from(self.process_id.as_str()),
        );
        fields.insert("process".into(), FieldValue::from(self.process.as_str()));
        fields.insert("memory_used_mb".into(), self.memory_used_mb.into());
        fields
    }
}
