//! Device enumeration.
//!
//! Devices are rediscovered on every collection cycle, either from the
//! configured device list or from the diagnostic tool's scan. Model and
//! capacity are enriched from sysfs when it is readable:
//! - /sys/block/<name>/device/model
//! - /sys/class/nvme/<name>/model
//! - /sys/block/<name>/size (512-byte sectors)

use ahash::AHashSet as HashSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::tool::DiagnosticTool;

/// Default sysfs mount point used for model/capacity enrichment.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Transport protocol reported by the diagnostic tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Ata,
    Nvme,
    Scsi,
    Unknown,
}

impl InterfaceType {
    /// Classifies the smartctl `protocol` string (or a `-d` type as fallback).
    pub fn from_protocol(protocol: &str) -> Self {
        let p = protocol.to_ascii_lowercase();
        if p == "ata" || p == "sat" || p.starts_with("sat,") || p == "usbsunplus" {
            InterfaceType::Ata
        } else if p == "nvme" || p.starts_with("nvme,") || p == "sntjmicron" || p == "sntasmedia" {
            InterfaceType::Nvme
        } else if p == "scsi" {
            InterfaceType::Scsi
        } else {
            InterfaceType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Ata => "ata",
            InterfaceType::Nvme => "nvme",
            InterfaceType::Scsi => "scsi",
            InterfaceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the tool's device scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedDevice {
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub protocol: String,
}

/// Explicitly configured device, bypassing the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredDevice {
    pub path: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// A block device to query during one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Device path, e.g. `/dev/sda`.
    pub name: String,
    /// smartctl `-d` type, e.g. `sat`, `nvme`, `megaraid,0`. Empty means auto.
    pub device_type: String,
    pub interface: InterfaceType,
    pub model: Option<String>,
    pub capacity_bytes: Option<u64>,
}

impl Device {
    pub fn new(name: impl Into<String>, device_type: impl Into<String>, interface: InterfaceType) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            interface,
            model: None,
            capacity_bytes: None,
        }
    }

    /// Identifier used as the `device` label and as the snapshot key.
    ///
    /// RAID pass-through types address several disks behind one path, so the
    /// type is part of the identity there.
    pub fn id(&self) -> String {
        if self.device_type.contains(',') && !self.device_type.starts_with("sat,") {
            format!("{} [{}]", self.name, self.device_type)
        } else {
            self.name.clone()
        }
    }

    /// Kernel name (`sda`, `nvme0`) derived from the path.
    pub fn kernel_name(&self) -> Option<&str> {
        Path::new(&self.name).file_name().and_then(|n| n.to_str())
    }
}

impl From<ScannedDevice> for Device {
    fn from(s: ScannedDevice) -> Self {
        let protocol = if s.protocol.is_empty() { &s.device_type } else { &s.protocol };
        let interface = InterfaceType::from_protocol(protocol);
        Device::new(s.name, s.device_type, interface)
    }
}

impl From<&ConfiguredDevice> for Device {
    fn from(c: &ConfiguredDevice) -> Self {
        let device_type = c.device_type.clone().unwrap_or_default();
        let interface = match device_type.as_str() {
            "" => guess_interface_from_path(&c.path),
            t => InterfaceType::from_protocol(t),
        };
        Device::new(c.path.clone(), device_type, interface)
    }
}

fn guess_interface_from_path(path: &str) -> InterfaceType {
    if path.contains("nvme") {
        InterfaceType::Nvme
    } else {
        InterfaceType::Unknown
    }
}

/// Include/exclude patterns applied to device paths. Exclusion wins.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl DeviceFilter {
    pub fn from_patterns(include: &[String], exclude: &[String]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, regex::Error> {
            patterns.iter().map(|p| Regex::new(p)).collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn allows(&self, name: &str) -> bool {
        if self.exclude.iter().any(|r| r.is_match(name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|r| r.is_match(name))
    }
}

/// Settings for the enumerator.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub devices: Vec<ConfiguredDevice>,
    pub filter: DeviceFilter,
    pub sysfs_root: PathBuf,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            filter: DeviceFilter::default(),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }
}

/// Discovers devices for one cycle. The result is filtered, de-duplicated by
/// id and sorted by id; it may be empty.
pub async fn discover<T: DiagnosticTool>(
    tool: &T,
    settings: &DiscoverySettings,
) -> Result<Vec<Device>, FetchError> {
    let candidates: Vec<Device> = if settings.devices.is_empty() {
        tool.scan().await?.into_iter().map(Device::from).collect()
    } else {
        settings.devices.iter().map(Device::from).collect()
    };

    let mut seen = HashSet::new();
    let mut devices: Vec<Device> = candidates
        .into_iter()
        .filter(|d| {
            let allowed = settings.filter.allows(&d.name);
            if !allowed {
                debug!("Skipping device {}: filtered by include/exclude patterns", d.name);
            }
            allowed
        })
        .filter(|d| seen.insert(d.id()))
        .map(|mut d| {
            enrich_from_sysfs(&mut d, &settings.sysfs_root);
            d
        })
        .collect();

    devices.sort_by_key(|d| d.id());
    debug!("Discovered {} devices", devices.len());
    Ok(devices)
}

/// Fills model and capacity from sysfs when the files are readable.
/// Missing or unreadable files are not an error.
pub fn enrich_from_sysfs(device: &mut Device, sysfs_root: &Path) {
    let Some(kname) = device.kernel_name().map(str::to_string) else {
        return;
    };

    if device.model.is_none() {
        let candidates = [
            sysfs_root.join("block").join(&kname).join("device/model"),
            sysfs_root.join("class/nvme").join(&kname).join("model"),
        ];
        device.model = candidates
            .iter()
            .find_map(|p| fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    if device.capacity_bytes.is_none() {
        let size_path = sysfs_root.join("block").join(&kname).join("size");
        if let Ok(content) = fs::read_to_string(&size_path) {
            match content.trim().parse::<u64>() {
                Ok(sectors) => device.capacity_bytes = Some(sectors.saturating_mul(512)),
                Err(e) => warn!("Unparseable {}: {}", size_path.display(), e),
            }
        }
    }
}
