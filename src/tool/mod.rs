//! Diagnostic tool abstraction.
//!
//! The exporter talks to exactly one external collaborator per process:
//! - `smartctl`: the real smartmontools binary
//! - `fixture`: replayed smartctl output from a JSON file (test data mode)

pub mod fixture;
pub mod smartctl;

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::device::{Device, ScannedDevice};
use crate::error::FetchError;
use crate::raw::RawAttributeRecord;

pub use fixture::FixtureTool;
pub use smartctl::Smartctl;

/// Version information of the diagnostic tool, exported as an info metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub version: String,
    #[serde(default)]
    pub svn_revision: String,
    #[serde(default)]
    pub platform_info: String,
    #[serde(default)]
    pub build_info: String,
}

/// The external collaborator queried for device lists and attributes.
///
/// Implementations must be cheap to share behind an `Arc`; every device
/// fetch of a cycle runs as its own task.
pub trait DiagnosticTool: Send + Sync + 'static {
    fn version(&self) -> impl Future<Output = Result<ToolInfo, FetchError>> + Send;

    fn scan(&self) -> impl Future<Output = Result<Vec<ScannedDevice>, FetchError>> + Send;

    fn read_device(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<RawAttributeRecord, FetchError>> + Send;
}

/// Tool selected at startup from the configuration.
pub enum Tool {
    Smartctl(Smartctl),
    Fixture(FixtureTool),
}

impl DiagnosticTool for Tool {
    async fn version(&self) -> Result<ToolInfo, FetchError> {
        match self {
            Tool::Smartctl(t) => t.version().await,
            Tool::Fixture(t) => t.version().await,
        }
    }

    async fn scan(&self) -> Result<Vec<ScannedDevice>, FetchError> {
        match self {
            Tool::Smartctl(t) => t.scan().await,
            Tool::Fixture(t) => t.scan().await,
        }
    }

    async fn read_device(&self, device: &Device) -> Result<RawAttributeRecord, FetchError> {
        match self {
            Tool::Smartctl(t) => t.read_device(device).await,
            Tool::Fixture(t) => t.read_device(device).await,
        }
    }
}
