//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files. An output of `-` writes to stdout.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("smartmon-exporter.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# SMART Metrics Exporter Configuration
# ====================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9541                   # HTTP port
# enable_health: true          # Enable /health endpoint
#
# smartctl
# --------
# smartctl_path: null          # Path to smartctl (null = look up on PATH)
# skip_standby: true           # Do not wake disks in standby (--nocheck=standby)
#
# Collection Cycle
# ----------------
# debounce_seconds: 60         # Reuse a snapshot younger than this (0 = always collect)
# device_timeout_seconds: 30   # Per-device smartctl deadline
# cycle_timeout_seconds: 60    # Deadline for a whole cycle (>= device timeout)
# max_concurrency: 4           # Concurrent smartctl invocations
#
# Device Selection
# ----------------
# include_devices: null        # Regexes on the device path, e.g. ["^/dev/sd"]
# exclude_devices: null        # Regexes on the device path; exclusion wins
# devices: null                # Explicit list, skips the scan:
#                              #   - path: /dev/sda
#                              #     type: sat
#                              #   - path: /dev/bus/0
#                              #     type: megaraid,0
#
# Testing
# -------
# test_data_file: null         # Replay smartctl output from a JSON fixture
"#;

    format!("{comments}\n{yaml}")
}
