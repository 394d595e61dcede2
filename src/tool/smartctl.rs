//! smartctl invocation.
//!
//! Every call runs `smartctl --json ...` as a child process. Children are
//! spawned with `kill_on_drop`, so a fetch abandoned by a timeout does not
//! leave a scan running against the device.

use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{DiagnosticTool, ToolInfo};
use crate::device::{Device, ScannedDevice};
use crate::error::{FetchError, StartupError};
use crate::raw::{RawAttributeRecord, EXIT_COMMAND_LINE};

/// Binary name looked up on `PATH` when no explicit path is configured.
pub const DEFAULT_SMARTCTL: &str = "smartctl";

/// Handle on a located smartctl binary.
#[derive(Debug, Clone)]
pub struct Smartctl {
    path: PathBuf,
    skip_standby: bool,
}

#[derive(Deserialize)]
struct VersionDoc {
    smartctl: VersionSection,
}

#[derive(Deserialize)]
struct VersionSection {
    #[serde(default)]
    version: Vec<u64>,
    #[serde(default)]
    svn_revision: String,
    #[serde(default)]
    platform_info: String,
    #[serde(default)]
    build_info: String,
}

#[derive(Deserialize)]
struct ScanDoc {
    #[serde(default)]
    devices: Vec<ScannedDevice>,
}

impl Smartctl {
    /// Resolves the binary through `PATH` (or the configured path).
    ///
    /// A missing binary is fatal at startup.
    pub fn locate(configured: Option<&Path>, skip_standby: bool) -> Result<Self, StartupError> {
        let target = configured.unwrap_or_else(|| Path::new(DEFAULT_SMARTCTL));
        let path = which::which(target).map_err(|e| {
            StartupError::ToolUnavailable(format!("{}: {}", target.display(), e))
        })?;
        debug!("Using smartctl at {}", path.display());
        Ok(Self { path, skip_standby })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments for a full per-device query.
    pub fn device_args(&self, device: &Device) -> Vec<String> {
        let mut args = vec!["--json".to_string(), "--all".to_string()];
        if self.skip_standby {
            // exit bit 1 when the disk sleeps, reported as unreadable
            args.push("--nocheck=standby".to_string());
        }
        if !device.device_type.is_empty() {
            args.push("-d".to_string());
            args.push(device.device_type.clone());
        }
        args.push(device.name.clone());
        args
    }

    async fn run(&self, args: &[String]) -> Result<(Vec<u8>, Option<i32>), FetchError> {
        let output = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    FetchError::ToolUnavailable(format!("{}: {}", self.path.display(), e))
                }
                _ => FetchError::DeviceUnreadable(format!("failed to run smartctl: {e}")),
            })?;
        Ok((output.stdout, output.status.code()))
    }
}

impl DiagnosticTool for Smartctl {
    async fn version(&self) -> Result<ToolInfo, FetchError> {
        let (stdout, _) = self.run(&["--json".to_string(), "--version".to_string()]).await?;
        let doc: VersionDoc = serde_json::from_slice(&stdout)
            .map_err(|e| FetchError::ToolUnavailable(format!("unexpected --version output: {e}")))?;
        let section = doc.smartctl;
        if section.version.is_empty() {
            // JSON output requires smartmontools 7.0 or newer
            return Err(FetchError::ToolUnavailable("smartctl did not report a version".into()));
        }

        Ok(ToolInfo {
            version: section
                .version
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("."),
            svn_revision: section.svn_revision,
            platform_info: section.platform_info,
            build_info: section.build_info,
        })
    }

    #[instrument(skip(self))]
    async fn scan(&self) -> Result<Vec<ScannedDevice>, FetchError> {
        let (stdout, status) = self.run(&["--json".to_string(), "--scan-open".to_string()]).await?;
        if status.unwrap_or(0) & EXIT_COMMAND_LINE != 0 {
            return Err(FetchError::ToolUnavailable("smartctl rejected --scan-open".into()));
        }
        let doc: ScanDoc = serde_json::from_slice(&stdout)
            .map_err(|e| FetchError::ParseError(format!("invalid --scan-open output: {e}")))?;
        Ok(doc.devices)
    }

    #[instrument(skip(self, device), fields(device = %device.id()))]
    async fn read_device(&self, device: &Device) -> Result<RawAttributeRecord, FetchError> {
        let (stdout, status) = self.run(&self.device_args(device)).await?;
        debug!("smartctl returned {:?} with {} bytes", status, stdout.len());
        RawAttributeRecord::from_smartctl_json(&stdout, status)
    }
}
