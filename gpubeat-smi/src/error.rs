//! Error types for collecting snapshots.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running the diagnostic tool or decoding
/// its report.
#[derive(Debug, Error)]
pub enum SmiError {
    /// The command could not be started or exited unsuccessfully.
    #[error("failed to run {program}: {reason}")]
    CommandFailed { program: String, reason: String },

    /// The command did not finish within the configured timeout.
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The output was not well-formed or did not match the expected layout.
    #[error("failed to decode report: {0}")]
    DecodeFailed(String),

    /// A field did not have the `"<number> <unit>"` shape.
    #[error("malformed value/unit string: {0:?}")]
    MalformedUnitString(String),
}

impl SmiError {
    /// True for errors caused by the external command rather than its output.
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            SmiError::CommandFailed { .. } | SmiError::Timeout { .. }
        )
    }
}

impl From<quick_xml::de::DeError> for SmiError {
    fn from(err: quick_xml::de::DeError) -> Self {
        SmiError::DecodeFailed(err.to_string())
    }
}
