//! Layered configuration.
//!
//! Sources, lowest priority first: built-in defaults, an optional config
//! file, then `GPUBEAT_*` environment variables. Nested keys use `__` in
//! the environment, e.g. `GPUBEAT_SMI__PATH=/opt/nvidia/bin/nvidia-smi`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Environment, File};
use gpubeat_sdk::{Beater, Collector, Output, ProcessTracking, SmiCommand};
use serde::Deserialize;

use crate::duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GPUBEAT";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Time between polls.
    #[serde(deserialize_with = "duration::deserialize")]
    pub period: Duration,

    /// Emit a `gpu_process` event for every process on a device.
    pub track_processes: bool,

    pub smi: SmiConfig,

    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmiConfig {
    /// Program to run; arguments are always `-q -x`.
    pub path: String,

    /// Upper bound for a single invocation.
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Stdout,
    File,
    Tcp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub kind: OutputKind,

    /// Target file for `kind = "file"`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// `host:port` for `kind = "tcp"`.
    #[serde(default)]
    pub address: Option<String>,
}

impl Config {
    /// Load from the optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("period", "1s")?
            .set_default("track_processes", true)?
            .set_default("smi.path", gpubeat_smi::command::DEFAULT_PROGRAM)?
            .set_default("smi.timeout", "10s")?
            .set_default("output.kind", "stdout")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let cfg: Config = builder
            .add_source(env.prefix_separator("_").separator("__"))
            .build()
            .context("reading configuration sources")?
            .try_deserialize()
            .context("invalid configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the collector cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            bail!("period must be greater than zero");
        }
        if self.smi.timeout.is_zero() {
            bail!("smi.timeout must be greater than zero");
        }
        if self.smi.path.trim().is_empty() {
            bail!("smi.path must not be empty");
        }
        match self.output.kind {
            OutputKind::File if self.output.path.is_none() => {
                bail!("output.path is required for the file output")
            }
            OutputKind::Tcp if self.output.address.is_none() => {
                bail!("output.address is required for the tcp output")
            }
            _ => Ok(()),
        }
    }

    pub fn command(&self) -> SmiCommand {
        SmiCommand::builder()
            .program(&self.smi.path)
            .timeout(self.smi.timeout)
            .build()
    }

    pub fn tracking(&self) -> ProcessTracking {
        ProcessTracking::from(self.track_processes)
    }

    pub fn collector(&self) -> Collector {
        Collector::new(self.command(), self.tracking())
    }

    pub fn output(&self) -> Result<Output> {
        let output = match self.output.kind {
            OutputKind::Stdout => Output::Stdout,
            OutputKind::File => Output::file(
                self.output
                    .path
                    .clone()
                    .context("output.path is required for the file output")?,
            ),
            OutputKind::Tcp => Output::tcp(
                self.output
                    .address
                    .clone()
                    .context("output.address is required for the tcp output")?,
            ),
        };
        Ok(output)
    }

    pub fn beater(&self) -> Result<Beater> {
        Ok(Beater::builder()
            .command(self.command())
            .process_tracking(self.tracking())
            .period(self.period)
            .output(self.output()?)
            .build())
    }
}
