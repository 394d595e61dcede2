//! Startup requirement validation for smartmon-exporter.
//!
//! This module validates that the exporter has all necessary permissions
//! and a usable diagnostic tool before starting.

use nix::unistd::geteuid;
use smartmon_exporter::error::StartupError;
use smartmon_exporter::tool::{DiagnosticTool, FixtureTool, Smartctl, Tool, ToolInfo};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;

/// Validate all runtime requirements
pub fn validate_requirements(config: &Config) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges()?;
    if config.test_data_file.is_none() {
        check_smartctl(config.smartctl_path.as_deref())?;
    }
    check_block_devices(Path::new("/sys/block"));

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() -> Result<(), ValidationError> {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - smartctl cannot open most block devices");
        warn!("   Recommendation: run as root or grant CAP_SYS_RAWIO and CAP_SYS_ADMIN");
        // Not an error - continue but warn
    } else {
        info!("✅ Running as root (uid=0)");
    }
    Ok(())
}

/// Check that smartctl can be found
fn check_smartctl(configured: Option<&Path>) -> Result<(), ValidationError> {
    match Smartctl::locate(configured, true) {
        Ok(smartctl) => {
            info!("✅ smartctl found at {}", smartctl.path().display());
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            error!("   Solution: install smartmontools (>= 7.0) or set smartctl_path");
            Err(ValidationError::SmartctlMissing(e.to_string()))
        }
    }
}

/// Warn when no block devices are visible
fn check_block_devices(sys_block: &Path) {
    match fs::read_dir(sys_block) {
        Ok(entries) => {
            let count = entries.filter_map(Result::ok).count();
            if count == 0 {
                warn!("⚠️  No block devices listed in {}", sys_block.display());
            } else {
                info!("✅ {} block devices listed in {}", count, sys_block.display());
            }
        }
        Err(e) => warn!("⚠️  Could not read {}: {}", sys_block.display(), e),
    }
}

/// Builds the diagnostic tool selected by the configuration: the fixture
/// replayer when a test data file is set, smartctl otherwise.
pub fn select_tool(config: &Config) -> Result<Tool, StartupError> {
    if let Some(path) = &config.test_data_file {
        info!("Using test data from {}", path.display());
        let fixture = FixtureTool::from_file(path)
            .map_err(|e| StartupError::InvalidConfig(format!("{e:#}")))?;
        return Ok(Tool::Fixture(fixture));
    }

    let smartctl = Smartctl::locate(
        config.smartctl_path.as_deref(),
        config.skip_standby.unwrap_or(true),
    )?;
    Ok(Tool::Smartctl(smartctl))
}

/// Queries the tool version; an unusable tool is fatal.
pub async fn probe_tool(tool: &Tool) -> Result<ToolInfo, StartupError> {
    tool.version()
        .await
        .map_err(|e| StartupError::ToolUnavailable(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("smartctl not available: {0}")]
    SmartctlMissing(String),
}
