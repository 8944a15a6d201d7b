//! Running the diagnostic command.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::{SmiError, Snapshot};

/// Default command name, resolved through `PATH`.
pub const DEFAULT_PROGRAM: &str = "nvidia-smi";

/// Arguments requesting the full report as XML.
pub const DEFAULT_ARGS: [&str; 2] = ["-q", "-x"];

/// Default upper bound on a single invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A configured invocation of the diagnostic tool.
///
/// # Example
///
/// ```rust,no_run
/// use gpubeat_smi::SmiCommand;
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), gpubeat_smi::SmiError> {
/// let command = SmiCommand::builder()
///     .program("/usr/bin/nvidia-smi")
///     .timeout(Duration::from_secs(5))
///     .build();
///
/// let snapshot = command.snapshot().await?;
/// println!("{} device(s)", snapshot.gpus.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SmiCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SmiCommand {
    pub fn builder() -> SmiCommandBuilder {
        SmiCommandBuilder::default()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the command and decode its report.
    ///
    /// Either a complete snapshot is returned or an error; there is no
    /// partial result.
    pub async fn snapshot(&self) -> Result<Snapshot, SmiError> {
        let xml = self.capture().await?;
        Snapshot::from_xml(&xml)
    }

    /// Run the command and return its standard output.
    ///
    /// The child is killed if it outlives the timeout.
    pub async fn capture(&self) -> Result<String, SmiError> {
        let started = Instant::now();

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(e.to_string()))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.failed(e.to_string()))?,
            Err(_) => {
                return Err(SmiError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr)
            };
            return Err(self.failed(reason));
        }

        debug!(
            program = %self.program,
            bytes = output.stdout.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "captured report"
        );

        String::from_utf8(output.stdout)
            .map_err(|e| SmiError::DecodeFailed(format!("output is not UTF-8: {}", e)))
    }

    fn failed(&self, reason: String) -> SmiError {
        SmiError::CommandFailed {
            program: self.program.clone(),
            reason,
        }
    }
}

impl Default for SmiCommand {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`SmiCommand`].
#[derive(Debug, Default)]
pub struct SmiCommandBuilder {
    program: Option<String>,
    args: Option<Vec<String>>,
    timeout: Option<Duration>,
}

impl SmiCommandBuilder {
    /// Set the executable (default: `nvidia-smi`).
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Replace the arguments (default: `-q -x`).
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Set the per-invocation timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> SmiCommand {
        SmiCommand {
            program: self
                .program
                .unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
            args: self
                .args
                .unwrap_or_else(|| DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}
