//! # gpubeat-smi
//!
//! Runs `nvidia-smi -q -x` and decodes its XML report into a typed
//! [`Snapshot`] of devices and the processes using them.
//!
//! Leaf values stay as the strings the tool prints (`"16384 MiB"`, `"5 %"`);
//! [`Quantity`] turns them into numbers when events are built.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gpubeat_smi::{Quantity, SmiCommand};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let snapshot = SmiCommand::default().snapshot().await?;
//!
//!     for gpu in &snapshot.gpus {
//!         let used = Quantity::parse(&gpu.fb_memory_usage.used)?;
//!         println!("{}: {} {} used", gpu.id, used.value, used.unit);
//!     }
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod error;
pub mod snapshot;
pub mod units;

pub use command::{SmiCommand, SmiCommandBuilder};
pub use error::SmiError;
pub use snapshot::{Device, MemoryUsage, Process, Processes, Snapshot, Utilization};
pub use units::Quantity;
