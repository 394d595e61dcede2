//! CLI command implementations for smartmon-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: smartctl, configuration and discovery validation
//! - `config`: Configuration file generation
//! - `test`: Collection cycle testing

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
