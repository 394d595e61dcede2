//! Error taxonomy for the exporter.
//!
//! Per-device failures are modelled by [`FetchError`] and never travel past the
//! snapshot builder: they are turned into `smart_device_error` samples.
//! [`StartupError`] covers the conditions that must stop the process before it
//! serves anything.

use std::time::Duration;

/// Failure while talking to the diagnostic tool about one device (or while
/// scanning for devices).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("diagnostic tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("device unreadable: {0}")]
    DeviceUnreadable(String),

    #[error("malformed tool output: {0}")]
    ParseError(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Stable label value used for the `reason` label of `smart_device_error`.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::ToolUnavailable(_) => "tool_unavailable",
            FetchError::DeviceUnreadable(_) => "device_unreadable",
            FetchError::ParseError(_) => "parse_error",
            FetchError::Timeout(_) => "timeout",
        }
    }
}

/// Fatal conditions detected before the HTTP listener starts.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("smartctl not usable: {0}")]
    ToolUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
