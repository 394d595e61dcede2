//! CLI arguments and subcommands for smartmon-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "smartmon-exporter",
    about = "Prometheus exporter for S.M.A.R.T. disk health metrics",
    long_about = "Prometheus exporter for S.M.A.R.T. disk health metrics.\n\n\
                  Queries smartctl for every discovered ATA, NVMe and SCSI device on each \
                  scrape, normalizes the vendor-specific attributes onto a fixed metric \
                  vocabulary and serves them in the Prometheus text format.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print only the loaded user config file + full path and exit
    #[arg(long)]
    pub show_user_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Path to the smartctl binary (default: looked up on PATH)
    #[arg(long)]
    pub smartctl_path: Option<PathBuf>,

    /// Reuse a snapshot younger than N seconds instead of collecting again
    #[arg(long)]
    pub debounce_seconds: Option<u64>,

    /// Per-device smartctl timeout in seconds
    #[arg(long)]
    pub device_timeout_seconds: Option<u64>,

    /// Deadline for a whole collection cycle in seconds
    #[arg(long)]
    pub cycle_timeout_seconds: Option<u64>,

    /// Maximum number of concurrent smartctl invocations
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Query devices in standby too (spins up sleeping disks)
    #[arg(long)]
    pub wake_standby: bool,

    /// Only export devices whose path matches one of these regexes (comma-separated)
    #[arg(long)]
    pub include_devices: Option<String>,

    /// Never export devices whose path matches one of these regexes (comma-separated)
    #[arg(long)]
    pub exclude_devices: Option<String>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Path to JSON test data file (replays smartctl output instead of running it)
    #[arg(short = 't', long)]
    pub test_data_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration, smartctl and device discovery
    Check {
        /// Also read every discovered device once
        #[arg(long)]
        devices: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Test metrics collection
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Show every normalized sample per device
        #[arg(long)]
        verbose: bool,

        /// Print the rendered exposition text of the last iteration
        #[arg(long)]
        exposition: bool,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}
