//! Scrape snapshot assembly.
//!
//! The builder turns per-device fetch results into one immutable snapshot.
//! A failed device is kept as a failure entry carrying a `smart_device_error`
//! sample, so the snapshot always has one entry per attempted device.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::slice;
use std::time::Duration;
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::FetchError;
use crate::normalize::{model_label, normalize, MetricName, NormalizedMetric};
use crate::raw::RawAttributeRecord;
use crate::tool::ToolInfo;

/// Outcome for one device within a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSnapshotResult {
    Success {
        metrics: Vec<NormalizedMetric>,
    },
    Failure {
        error: FetchError,
        indicator: NormalizedMetric,
    },
}

impl DeviceSnapshotResult {
    pub fn metrics(&self) -> &[NormalizedMetric] {
        match self {
            DeviceSnapshotResult::Success { metrics } => metrics,
            DeviceSnapshotResult::Failure { indicator, .. } => slice::from_ref(indicator),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeviceSnapshotResult::Success { .. })
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            DeviceSnapshotResult::Success { .. } => None,
            DeviceSnapshotResult::Failure { error, .. } => Some(error),
        }
    }
}

/// One device entry of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    pub device: Device,
    pub result: DeviceSnapshotResult,
}

/// Cycle-level facts recorded alongside the device entries.
#[derive(Debug, Clone, Default)]
pub struct CycleMeta {
    /// Sequence number of the cycle within this process, starting at 1.
    pub cycle: u64,
    pub duration: Duration,
    pub collected_at: DateTime<Utc>,
    /// Set when device discovery itself failed.
    pub discovery_error: Option<FetchError>,
    pub tool: Option<ToolInfo>,
}

/// The result of one collection cycle. Immutable once built.
#[derive(Debug, Clone)]
pub struct ScrapeSnapshot {
    /// Entries keyed by device id.
    pub devices: BTreeMap<String, DeviceEntry>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub meta: CycleMeta,
}

impl ScrapeSnapshot {
    /// All per-device samples, devices in id order.
    pub fn metrics(&self) -> impl Iterator<Item = &NormalizedMetric> {
        self.devices.values().flat_map(|e| e.result.metrics())
    }

    pub fn discovery_succeeded(&self) -> bool {
        self.meta.discovery_error.is_none()
    }
}

fn device_error_metric(device: &Device, model: String, reason: &str, value: f64) -> NormalizedMetric {
    NormalizedMetric {
        name: MetricName::DeviceError,
        label_values: vec![device.id(), model, reason.to_string()],
        value,
    }
}

/// Builds a snapshot from the fetch results of one cycle.
///
/// Successful fetches are normalized; failures become failure entries. The
/// attempted/succeeded/failed counts always add up.
pub fn build(
    fetched: Vec<(Device, Result<RawAttributeRecord, FetchError>)>,
    meta: CycleMeta,
) -> ScrapeSnapshot {
    let mut devices = BTreeMap::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (device, outcome) in fetched {
        let id = device.id();
        if devices.contains_key(&id) {
            warn!("Duplicate device id {} in cycle {}, keeping the first result", id, meta.cycle);
            continue;
        }

        let result = match outcome {
            Ok(record) => {
                let mut metrics = normalize(&device, &record);
                let model = model_label(&device, Some(&record));
                metrics.push(device_error_metric(&device, model, "", 0.0));
                metrics.sort_by_key(|m| m.name);
                succeeded += 1;
                debug!("Device {}: {} metrics", id, metrics.len());
                DeviceSnapshotResult::Success { metrics }
            }
            Err(error) => {
                warn!("Device {} failed: {}", id, error);
                let model = model_label(&device, None);
                let indicator = device_error_metric(&device, model, error.reason(), 1.0);
                failed += 1;
                DeviceSnapshotResult::Failure { error, indicator }
            }
        };

        devices.insert(id, DeviceEntry { device, result });
    }

    ScrapeSnapshot {
        attempted: devices.len(),
        devices,
        succeeded,
        failed,
        meta,
    }
}
