//! Replayed smartctl output for test data mode.
//!
//! A fixture file lists devices together with the JSON document smartctl
//! would have printed for them, or an injected failure. An optional delay
//! per device simulates slow scans.
//!
//! ```json
//! {
//!   "version": {"version": "7.4", "svn_revision": "5530"},
//!   "devices": [
//!     {"name": "/dev/sda", "type": "sat", "protocol": "ATA", "report": { ... }},
//!     {"name": "/dev/sdb", "type": "sat", "protocol": "ATA",
//!      "error": {"kind": "device_unreadable", "message": "standby"}}
//!   ]
//! }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{DiagnosticTool, ToolInfo};
use crate::device::{Device, ScannedDevice};
use crate::error::FetchError;
use crate::raw::RawAttributeRecord;

/// Failure injected for a fixture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixtureError {
    ToolUnavailable { message: String },
    DeviceUnreadable { message: String },
    ParseError { message: String },
}

impl From<&FixtureError> for FetchError {
    fn from(e: &FixtureError) -> Self {
        match e {
            FixtureError::ToolUnavailable { message } => FetchError::ToolUnavailable(message.clone()),
            FixtureError::DeviceUnreadable { message } => FetchError::DeviceUnreadable(message.clone()),
            FixtureError::ParseError { message } => FetchError::ParseError(message.clone()),
        }
    }
}

/// One device of a fixture file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDevice {
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub protocol: String,
    /// Simulated time the tool takes for this device.
    #[serde(default)]
    pub delay_ms: u64,
    /// Verbatim smartctl JSON document.
    #[serde(default)]
    pub report: Option<Value>,
    #[serde(default)]
    pub error: Option<FixtureError>,
    /// Listed by the scan but gone by the time it is read.
    #[serde(default)]
    pub vanished: bool,
}

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureData {
    #[serde(default)]
    pub version: Option<ToolInfo>,
    #[serde(default)]
    pub devices: Vec<FixtureDevice>,
}

/// Diagnostic tool serving fixture data.
#[derive(Debug, Default)]
pub struct FixtureTool {
    data: FixtureData,
    scans: AtomicU64,
    reads: AtomicU64,
}

impl FixtureTool {
    pub fn new(data: FixtureData) -> Self {
        Self {
            data,
            scans: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Loads a fixture file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read test data file {}", path.display()))?;
        let data: FixtureData = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse test data file {}", path.display()))?;
        debug!("Loaded {} fixture devices from {}", data.devices.len(), path.display());
        Ok(Self::new(data))
    }

    /// Number of device scans served so far.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of device reads served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl DiagnosticTool for FixtureTool {
    async fn version(&self) -> Result<ToolInfo, FetchError> {
        Ok(self.data.version.clone().unwrap_or_else(|| ToolInfo {
            version: "fixture".to_string(),
            ..ToolInfo::default()
        }))
    }

    async fn scan(&self) -> Result<Vec<ScannedDevice>, FetchError> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .data
            .devices
            .iter()
            .map(|d| ScannedDevice {
                name: d.name.clone(),
                device_type: d.device_type.clone(),
                protocol: d.protocol.clone(),
            })
            .collect())
    }

    async fn read_device(&self, device: &Device) -> Result<RawAttributeRecord, FetchError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let entry = self
            .data
            .devices
            .iter()
            .find(|d| d.name == device.name && (device.device_type.is_empty() || d.device_type == device.device_type))
            .filter(|d| !d.vanished)
            .ok_or_else(|| FetchError::DeviceUnreadable(format!("{}: No such device", device.name)))?;

        if entry.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(entry.delay_ms)).await;
        }

        if let Some(err) = &entry.error {
            return Err(err.into());
        }

        let report = entry
            .report
            .as_ref()
            .ok_or_else(|| FetchError::ParseError(format!("{}: empty tool output", device.name)))?;
        let bytes = serde_json::to_vec(report)
            .map_err(|e| FetchError::ParseError(e.to_string()))?;
        RawAttributeRecord::from_smartctl_json(&bytes, None)
    }
}
