//! Flattening snapshots into events.

use gpubeat_smi::{Device, Process, Quantity, Snapshot};
use gpubeat_types::{Event, GpuMetrics, GpuProcessMetrics};

/// Whether per-process events are emitted alongside per-device events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessTracking {
    /// One `gpu_process` event per process, after its device's `gpu` event.
    #[default]
    Enabled,
    /// Only `gpu` events.
    Disabled,
}

impl From<bool> for ProcessTracking {
    fn from(enabled: bool) -> Self {
        if enabled {
            ProcessTracking::Enabled
        } else {
            ProcessTracking::Disabled
        }
    }
}

/// Build the events for one snapshot.
///
/// Devices are emitted in report order; with tracking enabled each device's
/// `gpu` event is followed by its `gpu_process` events. Unparseable numeric
/// fields degrade to zero rather than dropping the device. Every event is
/// stamped when it is built.
pub fn build_events(snapshot: &Snapshot, tracking: ProcessTracking) -> Vec<Event> {
    let capacity = match tracking {
        ProcessTracking::Enabled => snapshot.gpus.len() + snapshot.process_count(),
        ProcessTracking::Disabled => snapshot.gpus.len(),
    };
    let mut events = Vec::with_capacity(capacity);

    for device in &snapshot.gpus {
        events.push(Event::gpu(gpu_metrics(device)));

        if tracking == ProcessTracking::Enabled {
            for process in device.processes() {
                events.push(Event::gpu_process(process_metrics(&device.id, process)));
            }
        }
    }

    events
}

/// Convert one device record, stripping units from every numeric field.
pub fn gpu_metrics(device: &Device) -> GpuMetrics {
    let fb = &device.fb_memory_usage;
    let bar1 = &device.bar1_memory_usage;
    let util = &device.utilization;

    GpuMetrics {
        id: device.id.clone(),
        frame_buffer_total_mb: Quantity::value_or_zero("fb_memory_usage.total", &fb.total),
        frame_buffer_free_mb: Quantity::value_or_zero("fb_memory_usage.free", &fb.free),
        frame_buffer_used_mb: Quantity::value_or_zero("fb_memory_usage.used", &fb.used),
        bar1_total_mb: Quantity::value_or_zero("bar1_memory_usage.total", &bar1.total),
        bar1_free_mb: Quantity::value_or_zero("bar1_memory_usage.free", &bar1.free),
        bar1_used_mb: Quantity::value_or_zero("bar1_memory_usage.used", &bar1.used),
        processor_utilization_pct: Quantity::value_or_zero("utilization.gpu_util", &util.gpu_util),
        memory_utilization_pct: Quantity::value_or_zero(
            "utilization.memory_util",
            &util.memory_util,
        ),
        process_count: device.processes().len() as u64,
    }
}

/// Convert one process record owned by the device `gpu_id`.
pub fn process_metrics(gpu_id: &str, process: &Process) -> GpuProcessMetrics {
    GpuProcessMetrics {
        gpu_id: gpu_id.to_string(),
        process_id: process.pid.clone(),
        process: process.process_name.clone(),
        memory_used_mb: Quantity::value_or_zero("process_info.used_memory", &process.used_memory),
    }
}
