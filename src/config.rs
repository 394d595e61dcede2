//! Configuration management for smartmon-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use smartmon_exporter::collector::{
    CollectorSettings, DEFAULT_CYCLE_TIMEOUT, DEFAULT_DEVICE_TIMEOUT, DEFAULT_MAX_CONCURRENCY,
};
use smartmon_exporter::device::{ConfiguredDevice, DeviceFilter, DiscoverySettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9541;
pub const DEFAULT_DEBOUNCE_SECONDS: u64 = 60;

/// Locations searched when no `--config` is given, in order.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/smartmon-exporter/config.yaml",
    "/etc/smartmon-exporter/config.yml",
    "/etc/smartmon-exporter/config.json",
    "/etc/smartmon-exporter/config.toml",
    "./smartmon-exporter.yaml",
    "./smartmon-exporter.yml",
    "./smartmon-exporter.json",
    "./smartmon-exporter.toml",
];

/// Exporter configuration. Every field is optional; missing values fall
/// back to the defaults at the point of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // smartctl invocation
    #[serde(alias = "smartctl-path")]
    pub smartctl_path: Option<PathBuf>,
    /// Pass `--nocheck=standby` so sleeping disks are not spun up.
    #[serde(alias = "skip-standby")]
    pub skip_standby: Option<bool>,

    // Collection cycle
    #[serde(alias = "debounce-seconds")]
    pub debounce_seconds: Option<u64>,
    #[serde(alias = "device-timeout-seconds")]
    pub device_timeout_seconds: Option<u64>,
    #[serde(alias = "cycle-timeout-seconds")]
    pub cycle_timeout_seconds: Option<u64>,
    #[serde(alias = "max-concurrency")]
    pub max_concurrency: Option<usize>,

    // Device selection
    #[serde(alias = "include-devices")]
    pub include_devices: Option<Vec<String>>,
    #[serde(alias = "exclude-devices")]
    pub exclude_devices: Option<Vec<String>>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    /// Path to JSON test data file (replays smartctl output)
    #[serde(alias = "test-data-file")]
    pub test_data_file: Option<PathBuf>,

    /// Explicit device list; when set the smartctl scan is skipped.
    /// Kept last so TOML output emits plain values before the table array.
    pub devices: Option<Vec<ConfiguredDevice>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            smartctl_path: None,
            skip_standby: Some(true),
            debounce_seconds: Some(DEFAULT_DEBOUNCE_SECONDS),
            device_timeout_seconds: Some(DEFAULT_DEVICE_TIMEOUT.as_secs()),
            cycle_timeout_seconds: Some(DEFAULT_CYCLE_TIMEOUT.as_secs()),
            max_concurrency: Some(DEFAULT_MAX_CONCURRENCY),
            include_devices: None,
            exclude_devices: None,
            enable_health: Some(true),
            test_data_file: None,
            devices: None,
        }
    }
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_seconds.unwrap_or(DEFAULT_DEBOUNCE_SECONDS))
    }

    pub fn device_timeout(&self) -> Duration {
        self.device_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DEVICE_TIMEOUT)
    }

    pub fn cycle_timeout(&self) -> Duration {
        self.cycle_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CYCLE_TIMEOUT)
    }

    pub fn device_filter(&self) -> Result<DeviceFilter, regex::Error> {
        DeviceFilter::from_patterns(
            self.include_devices.as_deref().unwrap_or_default(),
            self.exclude_devices.as_deref().unwrap_or_default(),
        )
    }

    /// Collector settings derived from this configuration.
    pub fn collector_settings(&self) -> Result<CollectorSettings, regex::Error> {
        Ok(CollectorSettings {
            discovery: DiscoverySettings {
                devices: self.devices.clone().unwrap_or_default(),
                filter: self.device_filter()?,
                ..DiscoverySettings::default()
            },
            max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            device_timeout: self.device_timeout(),
            cycle_timeout: self.cycle_timeout(),
        })
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.max_concurrency == Some(0) {
        return Err("max_concurrency must be at least 1".into());
    }
    if cfg.device_timeout_seconds == Some(0) {
        return Err("device_timeout_seconds must be greater than 0".into());
    }
    if cfg.cycle_timeout_seconds == Some(0) {
        return Err("cycle_timeout_seconds must be greater than 0".into());
    }
    if cfg.cycle_timeout() < cfg.device_timeout() {
        return Err(format!(
            "cycle_timeout_seconds ({}) must not be shorter than device_timeout_seconds ({})",
            cfg.cycle_timeout().as_secs(),
            cfg.device_timeout().as_secs()
        )
        .into());
    }

    if let Some(bind) = cfg.bind.as_deref() {
        bind.parse::<std::net::IpAddr>()
            .map_err(|e| format!("Invalid bind address '{}': {}", bind, e))?;
    }

    cfg.device_filter()
        .map_err(|e| format!("Invalid device pattern: {}", e))?;

    if let Some(devices) = &cfg.devices {
        if let Some(d) = devices.iter().find(|d| d.path.trim().is_empty()) {
            return Err(format!("Configured device has an empty path: {:?}", d).into());
        }
    }

    if let Some(path) = &cfg.test_data_file {
        if !path.exists() {
            return Err(format!("Test data file not found: {}", path.display()).into());
        }
    }

    Ok(())
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(path) = &args.smartctl_path {
        config.smartctl_path = Some(path.clone());
    }
    if args.wake_standby {
        config.skip_standby = Some(false);
    }

    // Collection cycle
    if let Some(v) = args.debounce_seconds {
        config.debounce_seconds = Some(v);
    }
    if let Some(v) = args.device_timeout_seconds {
        config.device_timeout_seconds = Some(v);
    }
    if let Some(v) = args.cycle_timeout_seconds {
        config.cycle_timeout_seconds = Some(v);
    }
    if let Some(v) = args.max_concurrency {
        config.max_concurrency = Some(v);
    }

    // Comma-separated include/exclude patterns
    if let Some(include) = &args.include_devices {
        config.include_devices = Some(split_patterns(include));
    }
    if let Some(exclude) = &args.exclude_devices {
        config.exclude_devices = Some(split_patterns(exclude));
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }

    // Test data file: CLI wins if provided
    if let Some(test_file) = &args.test_data_file {
        config.test_data_file = Some(test_file.clone());
    }

    Ok(config)
}

/// Config file that [`load_config`] reads: the explicit path, which must
/// exist, or the first default location that does. `None` means built-in
/// defaults.
pub fn config_file_path(path: Option<&Path>) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    match path {
        Some(p) if !p.exists() => Err(format!("Config file not found: {}", p.display()).into()),
        Some(p) => Ok(Some(p.to_path_buf())),
        None => Ok(DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)),
    }
}

/// Loads a config file, picking the format from the extension (YAML by
/// default). Without an explicit path the default locations are tried and
/// the built-in defaults are used when none exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let Some(path) = config_file_path(path)? else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Serializes a configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, &format)?;
    println!("{output}");
    Ok(())
}

/// Describes the user config file: its full path and verbatim contents.
pub fn user_config_report(path: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    let Some(path) = config_file_path(path)? else {
        return Ok("# No user configuration file found; built-in defaults are in effect\n".to_string());
    };
    let full_path = fs::canonicalize(&path)?;
    let content = fs::read_to_string(&full_path)?;
    Ok(format!("# User configuration file: {}\n{}", full_path.display(), content))
}
