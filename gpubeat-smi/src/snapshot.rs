//! Typed schema for the `nvidia-smi -q -x` report.
//!
//! Only the elements gpubeat publishes are mapped; everything else in the
//! report (clocks, temperatures, ECC counters...) is skipped by the decoder.
//! Leaf values are kept as the raw strings the tool prints (`"16384 MiB"`,
//! `"5 %"`, `"N/A"`); converting them to numbers is the event builder's job.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::warn;

use crate::SmiError;

/// One decoded report covering every attached device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    /// Capture time as printed by the tool (local time, free-form).
    pub timestamp: String,

    pub driver_version: String,

    /// Device count as reported by the tool.
    pub attached_gpus: u32,

    #[serde(rename = "gpu", default)]
    pub gpus: Vec<Device>,
}

impl Snapshot {
    /// Decode a report.
    ///
    /// Fails if the document is not well-formed, misses one of the root
    /// elements, or lists the same device id twice.
    pub fn from_xml(xml: &str) -> Result<Self, SmiError> {
        let snapshot: Snapshot = quick_xml::de::from_str(xml)?;

        let mut seen = HashSet::with_capacity(snapshot.gpus.len());
        for gpu in &snapshot.gpus {
            if !seen.insert(gpu.id.as_str()) {
                return Err(SmiError::DecodeFailed(format!(
                    "duplicate gpu id {:?}",
                    gpu.id
                )));
            }
        }

        if snapshot.attached_gpus as usize != snapshot.gpus.len() {
            warn!(
                attached = snapshot.attached_gpus,
                listed = snapshot.gpus.len(),
                "attached_gpus does not match the number of gpu entries"
            );
        }

        Ok(snapshot)
    }

    /// Total number of processes across all devices.
    pub fn process_count(&self) -> usize {
        self.gpus.iter().map(|g| g.processes().len()).sum()
    }
}

/// One accelerator in the report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    /// PCI bus id, e.g. `00000000:01:00.0`.
    #[serde(rename = "@id")]
    pub id: String,

    /// Frame buffer (on-board) memory.
    #[serde(default)]
    pub fb_memory_usage: MemoryUsage,

    /// BAR1 (host-mapped) memory.
    #[serde(default)]
    pub bar1_memory_usage: MemoryUsage,

    #[serde(default)]
    pub utilization: Utilization,

    #[serde(default)]
    pub processes: Processes,
}

impl Device {
    pub fn processes(&self) -> &[Process] {
        &self.processes.process_info
    }
}

/// Total/free/used for one memory region.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MemoryUsage {
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub free: String,
    #[serde(default)]
    pub used: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Utilization {
    #[serde(default)]
    pub gpu_util: String,
    #[serde(default)]
    pub memory_util: String,
}

/// Wrapper for the `<processes>` element.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Processes {
    #[serde(default)]
    pub process_info: Vec<Process>,
}

/// A process holding memory on a device.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Process {
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub process_name: String,
    #[serde(default)]
    pub used_memory: String,
}
