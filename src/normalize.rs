//! Attribute normalization.
//!
//! Maps interface-specific raw records onto a fixed metric vocabulary. The
//! record is classified by interface first (ATA / NVMe / SCSI), then a
//! per-interface rule table maps attribute ids or log fields to canonical
//! metrics with one unit each. Everything the tables do not know is exported
//! only through the bounded `smart_attribute_*` catch-all families, keyed by
//! attribute id.

use ahash::AHashSet as HashSet;
use std::fmt;

use crate::device::{Device, InterfaceType};
use crate::raw::{AtaAttribute, NvmeHealthLog, RawAttributeRecord, RawAttributes, ScsiCounters};

/// Labels carried by every per-device metric.
pub const BASE_LABELS: [&str; 2] = ["device", "model"];

/// Prometheus metric type of a vocabulary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Fixed metric vocabulary. Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricName {
    Healthy,
    DeviceError,
    DeviceInfo,
    SmartctlExitStatus,
    CapacityBytes,
    TemperatureCelsius,
    AirflowTemperatureCelsius,
    PowerOnHours,
    PowerCyclesTotal,
    StartStopsTotal,
    LoadCyclesTotal,
    ReallocatedSectorsTotal,
    SpinRetriesTotal,
    ReportedUncorrectableErrorsTotal,
    CommandTimeoutsTotal,
    ReallocatedEventsTotal,
    PendingSectors,
    OfflineUncorrectableSectorsTotal,
    CriticalWarning,
    AvailableSpareRatio,
    AvailableSpareThresholdRatio,
    EnduranceUsedRatio,
    ReadBytesTotal,
    WrittenBytesTotal,
    UnsafeShutdownsTotal,
    MediaErrorsTotal,
    ErrorLogEntriesTotal,
    GrownDefectsTotal,
    ReadUncorrectedErrorsTotal,
    WriteUncorrectedErrorsTotal,
    AttributeValue,
    AttributeWorst,
    AttributeThreshold,
    AttributeRawValue,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Healthy => "smart_healthy",
            MetricName::DeviceError => "smart_device_error",
            MetricName::DeviceInfo => "smart_device_info",
            MetricName::SmartctlExitStatus => "smart_smartctl_exit_status",
            MetricName::CapacityBytes => "smart_capacity_bytes",
            MetricName::TemperatureCelsius => "smart_temperature_celsius",
            MetricName::AirflowTemperatureCelsius => "smart_airflow_temperature_celsius",
            MetricName::PowerOnHours => "smart_power_on_hours",
            MetricName::PowerCyclesTotal => "smart_power_cycles_total",
            MetricName::StartStopsTotal => "smart_start_stops_total",
            MetricName::LoadCyclesTotal => "smart_load_cycles_total",
            MetricName::ReallocatedSectorsTotal => "smart_reallocated_sectors_total",
            MetricName::SpinRetriesTotal => "smart_spin_retries_total",
            MetricName::ReportedUncorrectableErrorsTotal => "smart_reported_uncorrectable_errors_total",
            MetricName::CommandTimeoutsTotal => "smart_command_timeouts_total",
            MetricName::ReallocatedEventsTotal => "smart_reallocated_events_total",
            MetricName::PendingSectors => "smart_pending_sectors",
            MetricName::OfflineUncorrectableSectorsTotal => "smart_offline_uncorrectable_sectors_total",
            MetricName::CriticalWarning => "smart_critical_warning",
            MetricName::AvailableSpareRatio => "smart_available_spare_ratio",
            MetricName::AvailableSpareThresholdRatio => "smart_available_spare_threshold_ratio",
            MetricName::EnduranceUsedRatio => "smart_endurance_used_ratio",
            MetricName::ReadBytesTotal => "smart_read_bytes_total",
            MetricName::WrittenBytesTotal => "smart_written_bytes_total",
            MetricName::UnsafeShutdownsTotal => "smart_unsafe_shutdowns_total",
            MetricName::MediaErrorsTotal => "smart_media_errors_total",
            MetricName::ErrorLogEntriesTotal => "smart_error_log_entries_total",
            MetricName::GrownDefectsTotal => "smart_grown_defects_total",
            MetricName::ReadUncorrectedErrorsTotal => "smart_read_uncorrected_errors_total",
            MetricName::WriteUncorrectedErrorsTotal => "smart_write_uncorrected_errors_total",
            MetricName::AttributeValue => "smart_attribute_value",
            MetricName::AttributeWorst => "smart_attribute_worst",
            MetricName::AttributeThreshold => "smart_attribute_threshold",
            MetricName::AttributeRawValue => "smart_attribute_raw_value",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricName::Healthy => "Whether the device passed its S.M.A.R.T. overall self-assessment (1) or not (0)",
            MetricName::DeviceError => "Whether reading the device failed during the last collection (1) or not (0)",
            MetricName::DeviceInfo => "S.M.A.R.T. device identity",
            MetricName::SmartctlExitStatus => {
                "smartctl exit status bitmask for the device (bit 3: disk failing, bit 4: prefail attribute below threshold, bit 6: error log has entries)"
            }
            MetricName::CapacityBytes => "User capacity of the device in bytes",
            MetricName::TemperatureCelsius => "Current device temperature in degrees Celsius",
            MetricName::AirflowTemperatureCelsius => "Airflow temperature in degrees Celsius (ATA attribute 190)",
            MetricName::PowerOnHours => "Accumulated power-on time in hours",
            MetricName::PowerCyclesTotal => "Number of power-on/off cycles",
            MetricName::StartStopsTotal => "Number of spindle start/stop cycles",
            MetricName::LoadCyclesTotal => "Number of head load/unload cycles",
            MetricName::ReallocatedSectorsTotal => "Number of reallocated sectors",
            MetricName::SpinRetriesTotal => "Number of spin-up retries",
            MetricName::ReportedUncorrectableErrorsTotal => "Number of errors that could not be recovered using ECC",
            MetricName::CommandTimeoutsTotal => "Number of aborted operations due to command timeout",
            MetricName::ReallocatedEventsTotal => "Number of remap operations",
            MetricName::PendingSectors => "Number of unstable sectors waiting to be remapped",
            MetricName::OfflineUncorrectableSectorsTotal => "Number of uncorrectable sectors found during offline scans",
            MetricName::CriticalWarning => "Whether the NVMe controller reports any critical warning (1) or none (0)",
            MetricName::AvailableSpareRatio => "Remaining spare capacity as a ratio (0.0-1.0)",
            MetricName::AvailableSpareThresholdRatio => "Spare capacity threshold as a ratio (0.0-1.0)",
            MetricName::EnduranceUsedRatio => "Vendor estimate of consumed endurance as a ratio (may exceed 1.0)",
            MetricName::ReadBytesTotal => "Bytes read from the device",
            MetricName::WrittenBytesTotal => "Bytes written to the device",
            MetricName::UnsafeShutdownsTotal => "Number of unsafe shutdowns",
            MetricName::MediaErrorsTotal => "Number of unrecovered data integrity errors",
            MetricName::ErrorLogEntriesTotal => "Number of error information log entries",
            MetricName::GrownDefectsTotal => "Number of entries in the SCSI grown defect list",
            MetricName::ReadUncorrectedErrorsTotal => "Number of uncorrected read errors",
            MetricName::WriteUncorrectedErrorsTotal => "Number of uncorrected write errors",
            MetricName::AttributeValue => "Normalized current value of a raw device attribute",
            MetricName::AttributeWorst => "Worst normalized value of a raw device attribute",
            MetricName::AttributeThreshold => "Failure threshold of a raw device attribute",
            MetricName::AttributeRawValue => "Unprocessed raw value of a device attribute",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricName::PowerOnHours
            | MetricName::PowerCyclesTotal
            | MetricName::StartStopsTotal
            | MetricName::LoadCyclesTotal
            | MetricName::ReallocatedSectorsTotal
            | MetricName::SpinRetriesTotal
            | MetricName::ReportedUncorrectableErrorsTotal
            | MetricName::CommandTimeoutsTotal
            | MetricName::ReallocatedEventsTotal
            | MetricName::OfflineUncorrectableSectorsTotal
            | MetricName::ReadBytesTotal
            | MetricName::WrittenBytesTotal
            | MetricName::UnsafeShutdownsTotal
            | MetricName::MediaErrorsTotal
            | MetricName::ErrorLogEntriesTotal
            | MetricName::GrownDefectsTotal
            | MetricName::ReadUncorrectedErrorsTotal
            | MetricName::WriteUncorrectedErrorsTotal => MetricKind::Counter,
            _ => MetricKind::Gauge,
        }
    }

    /// Labels added after [`BASE_LABELS`].
    pub fn extra_labels(&self) -> &'static [&'static str] {
        match self {
            MetricName::DeviceError => &["reason"],
            MetricName::DeviceInfo => &[
                "interface",
                "type",
                "serial_number",
                "firmware_version",
                "model_family",
                "wwn",
            ],
            MetricName::AttributeValue
            | MetricName::AttributeWorst
            | MetricName::AttributeThreshold
            | MetricName::AttributeRawValue => &["attribute_id", "attribute_name"],
            _ => &[],
        }
    }

    /// Full ordered label set of the family.
    pub fn label_names(&self) -> Vec<&'static str> {
        BASE_LABELS
            .iter()
            .chain(self.extra_labels())
            .copied()
            .collect()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sample: metric name, label values in [`MetricName::label_names`]
/// order, and value.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetric {
    pub name: MetricName,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl NormalizedMetric {
    /// Looks up a label value by label name.
    pub fn label(&self, label: &str) -> Option<&str> {
        self.name
            .label_names()
            .iter()
            .position(|l| *l == label)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// How a canonical value is cut out of a 48-bit ATA raw field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The whole 48-bit raw value.
    Full,
    /// Bytes 0-1; vendors pack further counters into the upper words.
    Low16,
    /// Bytes 0-2; byte 3 and up carry milliseconds or vendor data.
    Low24,
    /// Bytes 0-3.
    Low32,
    /// Byte 0 as a signed value; bytes 2-5 hold min/max temperatures.
    SignedLowByte,
}

impl Extraction {
    pub fn apply(&self, raw: u64) -> f64 {
        match self {
            Extraction::Full => (raw & 0xFFFF_FFFF_FFFF) as f64,
            Extraction::Low16 => (raw & 0xFFFF) as f64,
            Extraction::Low24 => (raw & 0xFF_FFFF) as f64,
            Extraction::Low32 => (raw & 0xFFFF_FFFF) as f64,
            Extraction::SignedLowByte => f64::from((raw & 0xFF) as u8 as i8),
        }
    }
}

/// Unit handling applied after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    None,
    /// Attribute 9 is renamed by the drive database when the vendor counts
    /// minutes, seconds or half-minutes instead of hours.
    PowerOnTime,
}

/// Canonical mapping of one ATA attribute id.
#[derive(Debug, Clone, Copy)]
pub struct AtaRule {
    pub id: u8,
    pub metric: MetricName,
    pub extraction: Extraction,
    pub conversion: Conversion,
}

const fn ata(id: u8, metric: MetricName, extraction: Extraction) -> AtaRule {
    AtaRule {
        id,
        metric,
        extraction,
        conversion: Conversion::None,
    }
}

/// ATA rules in priority order: for one metric, the first rule whose
/// attribute is present wins.
pub const ATA_RULES: &[AtaRule] = &[
    ata(194, MetricName::TemperatureCelsius, Extraction::SignedLowByte),
    ata(190, MetricName::TemperatureCelsius, Extraction::SignedLowByte),
    ata(190, MetricName::AirflowTemperatureCelsius, Extraction::SignedLowByte),
    AtaRule {
        id: 9,
        metric: MetricName::PowerOnHours,
        extraction: Extraction::Low24,
        conversion: Conversion::PowerOnTime,
    },
    ata(12, MetricName::PowerCyclesTotal, Extraction::Full),
    ata(4, MetricName::StartStopsTotal, Extraction::Full),
    ata(193, MetricName::LoadCyclesTotal, Extraction::Low32),
    ata(5, MetricName::ReallocatedSectorsTotal, Extraction::Low32),
    ata(10, MetricName::SpinRetriesTotal, Extraction::Full),
    ata(187, MetricName::ReportedUncorrectableErrorsTotal, Extraction::Low16),
    ata(188, MetricName::CommandTimeoutsTotal, Extraction::Low16),
    ata(196, MetricName::ReallocatedEventsTotal, Extraction::Low16),
    ata(197, MetricName::PendingSectors, Extraction::Low32),
    ata(198, MetricName::OfflineUncorrectableSectorsTotal, Extraction::Low32),
];

/// NVMe health log value transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmeTransform {
    Identity,
    /// Percent to ratio.
    Percent,
    /// Bit field to 0/1.
    NonZero,
    /// Data units are thousands of 512-byte blocks.
    DataUnits,
}

impl NvmeTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            NvmeTransform::Identity => value,
            NvmeTransform::Percent => value / 100.0,
            NvmeTransform::NonZero => {
                if value != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            NvmeTransform::DataUnits => value * 512_000.0,
        }
    }
}

/// Canonical NVMe health log fields.
pub const NVME_RULES: &[(&str, MetricName, NvmeTransform)] = &[
    ("critical_warning", MetricName::CriticalWarning, NvmeTransform::NonZero),
    ("temperature", MetricName::TemperatureCelsius, NvmeTransform::Identity),
    ("available_spare", MetricName::AvailableSpareRatio, NvmeTransform::Percent),
    ("available_spare_threshold", MetricName::AvailableSpareThresholdRatio, NvmeTransform::Percent),
    ("percentage_used", MetricName::EnduranceUsedRatio, NvmeTransform::Percent),
    ("data_units_read", MetricName::ReadBytesTotal, NvmeTransform::DataUnits),
    ("data_units_written", MetricName::WrittenBytesTotal, NvmeTransform::DataUnits),
    ("power_cycles", MetricName::PowerCyclesTotal, NvmeTransform::Identity),
    ("power_on_hours", MetricName::PowerOnHours, NvmeTransform::Identity),
    ("unsafe_shutdowns", MetricName::UnsafeShutdownsTotal, NvmeTransform::Identity),
    ("media_errors", MetricName::MediaErrorsTotal, NvmeTransform::Identity),
    ("num_err_log_entries", MetricName::ErrorLogEntriesTotal, NvmeTransform::Identity),
];

/// Value of the `model` label.
///
/// The tool's own identity wins; the enumerated model is used for devices
/// that could not be read.
pub fn model_label(device: &Device, record: Option<&RawAttributeRecord>) -> String {
    record
        .and_then(|r| r.identity.model.clone())
        .or_else(|| device.model.clone())
        .unwrap_or_default()
}

/// Collects samples for one device, emitting each (name, labels) only once.
struct MetricSink {
    base: [String; 2],
    metrics: Vec<NormalizedMetric>,
    seen: HashSet<(MetricName, Vec<String>)>,
}

impl MetricSink {
    fn new(device_id: String, model: String) -> Self {
        Self {
            base: [device_id, model],
            metrics: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, name: MetricName, extra: &[&str], value: f64) {
        if !value.is_finite() || (name.kind() == MetricKind::Counter && value < 0.0) {
            return;
        }
        let label_values: Vec<String> = self
            .base
            .iter()
            .cloned()
            .chain(extra.iter().map(|s| s.to_string()))
            .collect();
        if !self.seen.insert((name, label_values.clone())) {
            return;
        }
        self.metrics.push(NormalizedMetric {
            name,
            label_values,
            value,
        });
    }

    fn finish(mut self) -> Vec<NormalizedMetric> {
        self.metrics.sort_by_key(|m| m.name);
        self.metrics
    }
}

/// Maps a raw record onto the canonical vocabulary.
///
/// Always emits `smart_healthy`, `smart_device_info` and
/// `smart_smartctl_exit_status`, even when the attribute payload is empty or
/// unknown. The output depends only on the inputs and is stable across calls.
pub fn normalize(device: &Device, record: &RawAttributeRecord) -> Vec<NormalizedMetric> {
    let mut sink = MetricSink::new(device.id(), model_label(device, Some(record)));

    let healthy = match record.smart_passed {
        Some(true) => 1.0,
        _ => 0.0,
    };
    sink.push(MetricName::Healthy, &[], healthy);

    let interface = match record.interface {
        InterfaceType::Unknown => device.interface,
        known => known,
    };
    let identity = &record.identity;
    sink.push(
        MetricName::DeviceInfo,
        &[
            interface.as_str(),
            device.device_type.as_str(),
            identity.serial_number.as_deref().unwrap_or(""),
            identity.firmware_version.as_deref().unwrap_or(""),
            identity.model_family.as_deref().unwrap_or(""),
            identity.wwn.as_deref().unwrap_or(""),
        ],
        1.0,
    );

    // fatal bits never reach here; what remains is the informational part
    sink.push(MetricName::SmartctlExitStatus, &[], record.exit_status as f64);

    if let Some(bytes) = identity.capacity_bytes.or(device.capacity_bytes) {
        sink.push(MetricName::CapacityBytes, &[], bytes as f64);
    }

    match &record.attributes {
        RawAttributes::Ata(rows) => normalize_ata(rows, &mut sink),
        RawAttributes::Nvme(log) => normalize_nvme(log, &mut sink),
        RawAttributes::Scsi(counters) => normalize_scsi(counters, &mut sink),
        RawAttributes::Unknown => {}
    }

    // Generic summaries only fill gaps left by the interface tables.
    if let Some(t) = record.temperature_celsius {
        sink.push(MetricName::TemperatureCelsius, &[], t);
    }
    if let Some(p) = record.power_on_time {
        if let Some(hours) = p.hours {
            let minutes = p.minutes.unwrap_or(0) as f64;
            sink.push(MetricName::PowerOnHours, &[], hours as f64 + minutes / 60.0);
        }
    }
    if let Some(cycles) = record.power_cycle_count {
        sink.push(MetricName::PowerCyclesTotal, &[], cycles as f64);
    }

    sink.finish()
}

/// Hours per unit of attribute 9, derived from the drive database name.
fn power_on_divisor(attribute_name: &str) -> (f64, Extraction) {
    match attribute_name {
        "Power_On_Minutes" => (60.0, Extraction::Low24),
        "Power_On_Half_Minutes" => (120.0, Extraction::Low24),
        // seconds overflow 24 bits within months
        "Power_On_Seconds" => (3600.0, Extraction::Low32),
        _ => (1.0, Extraction::Low24),
    }
}

/// Decodes one ATA attribute with its canonical rule.
pub fn decode_ata(rule: &AtaRule, attr: &AtaAttribute) -> f64 {
    match rule.conversion {
        Conversion::None => rule.extraction.apply(attr.raw.value),
        Conversion::PowerOnTime => {
            let (divisor, extraction) = power_on_divisor(&attr.name);
            extraction.apply(attr.raw.value) / divisor
        }
    }
}

fn normalize_ata(rows: &[AtaAttribute], sink: &mut MetricSink) {
    for rule in ATA_RULES {
        if let Some(attr) = rows.iter().find(|a| a.id == rule.id) {
            sink.push(rule.metric, &[], decode_ata(rule, attr));
        }
    }

    let mut sorted: Vec<&AtaAttribute> = rows.iter().collect();
    sorted.sort_by_key(|a| a.id);
    for attr in sorted {
        let id = attr.id.to_string();
        let labels = [id.as_str(), attr.name.as_str()];
        if let Some(v) = attr.value {
            sink.push(MetricName::AttributeValue, &labels, v as f64);
        }
        if let Some(w) = attr.worst {
            sink.push(MetricName::AttributeWorst, &labels, w as f64);
        }
        if let Some(t) = attr.thresh {
            sink.push(MetricName::AttributeThreshold, &labels, t as f64);
        }
        sink.push(MetricName::AttributeRawValue, &labels, attr.raw.value as f64);
    }
}

fn normalize_nvme(log: &NvmeHealthLog, sink: &mut MetricSink) {
    for (field, metric, transform) in NVME_RULES {
        if let Some(v) = log.get(field) {
            sink.push(*metric, &[], transform.apply(v));
        }
    }
    for (field, value) in &log.fields {
        sink.push(MetricName::AttributeRawValue, &[field.as_str(), field.as_str()], *value);
    }
}

fn normalize_scsi(counters: &ScsiCounters, sink: &mut MetricSink) {
    let pairs = [
        (MetricName::GrownDefectsTotal, counters.grown_defects),
        (MetricName::ReadUncorrectedErrorsTotal, counters.read_uncorrected_errors),
        (MetricName::WriteUncorrectedErrorsTotal, counters.write_uncorrected_errors),
        (MetricName::StartStopsTotal, counters.start_stop_cycles),
        (MetricName::LoadCyclesTotal, counters.load_unload_cycles),
    ];
    for (metric, value) in pairs {
        if let Some(v) = value {
            sink.push(metric, &[], v as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{AtaRawValue, DeviceIdentity, PowerOnTime};
    use std::collections::BTreeMap;

    fn attr(id: u8, name: &str, raw: u64) -> AtaAttribute {
        AtaAttribute {
            id,
            name: name.to_string(),
            value: Some(100),
            worst: Some(100),
            thresh: Some(0),
            raw: AtaRawValue { value: raw },
        }
    }

    fn record(attributes: RawAttributes, passed: Option<bool>) -> RawAttributeRecord {
        RawAttributeRecord {
            interface: InterfaceType::Ata,
            identity: DeviceIdentity {
                model: Some("TestDisk 1TB".into()),
                ..DeviceIdentity::default()
            },
            smart_passed: passed,
            temperature_celsius: None,
            power_on_time: None,
            power_cycle_count: None,
            attributes,
            exit_status: 0,
        }
    }

    fn sda() -> Device {
        Device::new("/dev/sda", "sat", InterfaceType::Ata)
    }

    fn value_of(metrics: &[NormalizedMetric], name: MetricName) -> Option<f64> {
        metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }

    #[test]
    fn test_temperature_and_health_example() {
        let rec = record(RawAttributes::Ata(vec![attr(194, "Temperature_Celsius", 35)]), Some(true));
        let metrics = normalize(&sda(), &rec);

        let temp = metrics
            .iter()
            .find(|m| m.name == MetricName::TemperatureCelsius)
            .unwrap();
        assert_eq!(temp.value, 35.0);
        assert_eq!(temp.label("device"), Some("/dev/sda"));
        assert_eq!(temp.label("model"), Some("TestDisk 1TB"));
        assert_eq!(value_of(&metrics, MetricName::Healthy), Some(1.0));
    }

    #[test]
    fn test_composite_temperature_raw_decodes_current_byte() {
        // 35 °C current, min 20, max 45 packed into the upper words
        let raw = (45u64 << 32) | (20u64 << 16) | 35;
        let rec = record(RawAttributes::Ata(vec![attr(194, "Temperature_Celsius", raw)]), Some(true));
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::TemperatureCelsius), Some(35.0));

        // the catch-all keeps the undecoded value
        let raw_metric = metrics
            .iter()
            .find(|m| m.name == MetricName::AttributeRawValue)
            .unwrap();
        assert_eq!(raw_metric.value, raw as f64);
        assert_eq!(raw_metric.label("attribute_id"), Some("194"));
    }

    #[test]
    fn test_power_on_hours_strips_milliseconds() {
        let raw = (0x1234u64 << 32) | 12_345;
        let rec = record(RawAttributes::Ata(vec![attr(9, "Power_On_Hours", raw)]), Some(true));
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::PowerOnHours), Some(12_345.0));
    }

    #[test]
    fn test_power_on_minutes_are_converted_to_hours() {
        let rec = record(RawAttributes::Ata(vec![attr(9, "Power_On_Minutes", 600)]), Some(true));
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::PowerOnHours), Some(10.0));

        let rec = record(RawAttributes::Ata(vec![attr(9, "Power_On_Seconds", 7200)]), Some(true));
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::PowerOnHours), Some(2.0));
    }

    #[test]
    fn test_command_timeout_uses_first_word() {
        // Seagate packs three 16-bit counters
        let raw = (7u64 << 32) | (5u64 << 16) | 3;
        let rec = record(RawAttributes::Ata(vec![attr(188, "Command_Timeout", raw)]), Some(true));
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::CommandTimeoutsTotal), Some(3.0));
    }

    #[test]
    fn test_194_wins_over_190_and_generic_temperature() {
        let mut rec = record(
            RawAttributes::Ata(vec![
                attr(190, "Airflow_Temperature_Cel", 31),
                attr(194, "Temperature_Celsius", 36),
            ]),
            Some(true),
        );
        rec.temperature_celsius = Some(99.0);
        let metrics = normalize(&sda(), &rec);

        assert_eq!(value_of(&metrics, MetricName::TemperatureCelsius), Some(36.0));
        assert_eq!(value_of(&metrics, MetricName::AirflowTemperatureCelsius), Some(31.0));
        let temps = metrics
            .iter()
            .filter(|m| m.name == MetricName::TemperatureCelsius)
            .count();
        assert_eq!(temps, 1);
    }

    #[test]
    fn test_health_present_without_attributes() {
        let rec = record(RawAttributes::Unknown, Some(true));
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::Healthy), Some(1.0));

        let rec = record(RawAttributes::Ata(vec![attr(250, "Vendor_Specific", 1)]), None);
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::Healthy), Some(0.0));
    }

    #[test]
    fn test_unknown_attributes_only_use_catch_all_names() {
        let rec = record(RawAttributes::Ata(vec![attr(231, "SSD_Life_Left", 98)]), Some(true));
        let metrics = normalize(&sda(), &rec);

        let names: Vec<MetricName> = metrics.iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec![
                MetricName::Healthy,
                MetricName::DeviceInfo,
                MetricName::SmartctlExitStatus,
                MetricName::AttributeValue,
                MetricName::AttributeWorst,
                MetricName::AttributeThreshold,
                MetricName::AttributeRawValue,
            ]
        );
    }

    #[test]
    fn test_failing_exit_bit_is_exported() {
        let mut rec = record(RawAttributes::Unknown, Some(false));
        rec.exit_status = 8;
        let metrics = normalize(&sda(), &rec);

        assert_eq!(value_of(&metrics, MetricName::SmartctlExitStatus), Some(8.0));
        assert_eq!(value_of(&metrics, MetricName::Healthy), Some(0.0));
        let info = metrics.iter().find(|m| m.name == MetricName::DeviceInfo).unwrap();
        assert_eq!(info.label("type"), Some("sat"));
    }

    #[test]
    fn test_catch_all_sorted_by_attribute_id() {
        let rec = record(
            RawAttributes::Ata(vec![attr(199, "UDMA_CRC_Error_Count", 0), attr(1, "Raw_Read_Error_Rate", 0)]),
            Some(true),
        );
        let metrics = normalize(&sda(), &rec);
        let ids: Vec<&str> = metrics
            .iter()
            .filter(|m| m.name == MetricName::AttributeRawValue)
            .filter_map(|m| m.label("attribute_id"))
            .collect();
        assert_eq!(ids, vec!["1", "199"]);
    }

    #[test]
    fn test_nvme_units() {
        let mut fields = BTreeMap::new();
        fields.insert("critical_warning".to_string(), 4.0);
        fields.insert("temperature".to_string(), 41.0);
        fields.insert("available_spare".to_string(), 100.0);
        fields.insert("percentage_used".to_string(), 3.0);
        fields.insert("data_units_written".to_string(), 2.0);
        fields.insert("power_on_hours".to_string(), 1200.0);

        let mut rec = record(RawAttributes::Nvme(NvmeHealthLog { fields }), Some(true));
        rec.interface = InterfaceType::Nvme;
        let device = Device::new("/dev/nvme0", "nvme", InterfaceType::Nvme);
        let metrics = normalize(&device, &rec);

        assert_eq!(value_of(&metrics, MetricName::CriticalWarning), Some(1.0));
        assert_eq!(value_of(&metrics, MetricName::TemperatureCelsius), Some(41.0));
        assert_eq!(value_of(&metrics, MetricName::AvailableSpareRatio), Some(1.0));
        assert_eq!(value_of(&metrics, MetricName::EnduranceUsedRatio), Some(0.03));
        assert_eq!(value_of(&metrics, MetricName::WrittenBytesTotal), Some(1_024_000.0));
        assert_eq!(value_of(&metrics, MetricName::PowerOnHours), Some(1200.0));

        let info = metrics.iter().find(|m| m.name == MetricName::DeviceInfo).unwrap();
        assert_eq!(info.label("interface"), Some("nvme"));
        assert_eq!(info.label("type"), Some("nvme"));
    }

    #[test]
    fn test_generic_fallbacks_fill_gaps() {
        let mut rec = record(RawAttributes::Unknown, Some(true));
        rec.temperature_celsius = Some(30.0);
        rec.power_on_time = Some(PowerOnTime {
            hours: Some(10),
            minutes: Some(30),
        });
        rec.power_cycle_count = Some(5);
        let metrics = normalize(&sda(), &rec);

        assert_eq!(value_of(&metrics, MetricName::TemperatureCelsius), Some(30.0));
        assert_eq!(value_of(&metrics, MetricName::PowerOnHours), Some(10.5));
        assert_eq!(value_of(&metrics, MetricName::PowerCyclesTotal), Some(5.0));
    }

    #[test]
    fn test_scsi_counters() {
        let mut rec = record(
            RawAttributes::Scsi(ScsiCounters {
                grown_defects: Some(4),
                start_stop_cycles: Some(19),
                ..ScsiCounters::default()
            }),
            Some(true),
        );
        rec.interface = InterfaceType::Scsi;
        let metrics = normalize(&sda(), &rec);
        assert_eq!(value_of(&metrics, MetricName::GrownDefectsTotal), Some(4.0));
        assert_eq!(value_of(&metrics, MetricName::StartStopsTotal), Some(19.0));
        assert_eq!(value_of(&metrics, MetricName::ReadUncorrectedErrorsTotal), None);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let rec = record(
            RawAttributes::Ata(vec![
                attr(5, "Reallocated_Sector_Ct", 0),
                attr(194, "Temperature_Celsius", 35),
                attr(9, "Power_On_Hours", 100),
                attr(240, "Head_Flying_Hours", 7),
            ]),
            Some(true),
        );
        assert_eq!(normalize(&sda(), &rec), normalize(&sda(), &rec));
    }

    #[test]
    fn test_signed_low_byte() {
        assert_eq!(Extraction::SignedLowByte.apply(0xFF), -1.0);
        assert_eq!(Extraction::Full.apply(u64::MAX), 0xFFFF_FFFF_FFFFu64 as f64);
    }

    #[test]
    fn test_label_names_include_base_labels() {
        assert_eq!(
            MetricName::AttributeRawValue.label_names(),
            vec!["device", "model", "attribute_id", "attribute_name"]
        );
        assert_eq!(MetricName::Healthy.label_names(), vec!["device", "model"]);
    }
}
