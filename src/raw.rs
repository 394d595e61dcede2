//! Raw attribute records decoded from smartctl JSON output.
//!
//! The tool output is untrusted and its shape varies between smartctl
//! releases, drive databases and transports. Decoding is done section by
//! section from a `serde_json::Value` so that one malformed section (or one
//! malformed ATA table row) does not discard the rest of the document.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::device::InterfaceType;
use crate::error::FetchError;

/// smartctl exit status bit 0: command line did not parse.
pub const EXIT_COMMAND_LINE: i32 = 1 << 0;
/// smartctl exit status bit 1: device open failed or device in low-power mode.
pub const EXIT_DEVICE_OPEN: i32 = 1 << 1;

/// Identity fields of a device as reported by the tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceIdentity {
    pub model: Option<String>,
    pub model_family: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub wwn: Option<String>,
    pub capacity_bytes: Option<u64>,
}

/// Raw 48-bit value of an ATA attribute.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AtaRawValue {
    #[serde(default)]
    pub value: u64,
}

/// One row of the ATA SMART attribute table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AtaAttribute {
    pub id: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub worst: Option<u64>,
    #[serde(default)]
    pub thresh: Option<u64>,
    #[serde(default)]
    pub raw: AtaRawValue,
}

/// Scalar numeric fields of the NVMe SMART/health information log, keyed by
/// field name. Arrays and nested objects are not kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NvmeHealthLog {
    pub fields: BTreeMap<String, f64>,
}

impl NvmeHealthLog {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }
}

/// Counters reported for SCSI/SAS devices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScsiCounters {
    pub grown_defects: Option<u64>,
    pub read_uncorrected_errors: Option<u64>,
    pub write_uncorrected_errors: Option<u64>,
    pub start_stop_cycles: Option<u64>,
    pub load_unload_cycles: Option<u64>,
}

/// Interface-specific attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAttributes {
    Ata(Vec<AtaAttribute>),
    Nvme(NvmeHealthLog),
    Scsi(ScsiCounters),
    /// Reachable device without any attribute payload the decoder knows.
    Unknown,
}

/// Generic power-on time as summarised by smartctl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PowerOnTime {
    #[serde(default)]
    pub hours: Option<u64>,
    #[serde(default)]
    pub minutes: Option<u64>,
}

/// Everything the tool reported about one device.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttributeRecord {
    pub interface: InterfaceType,
    pub identity: DeviceIdentity,
    /// Overall self-assessment; `None` when the tool did not report one.
    pub smart_passed: Option<bool>,
    pub temperature_celsius: Option<f64>,
    pub power_on_time: Option<PowerOnTime>,
    pub power_cycle_count: Option<u64>,
    pub attributes: RawAttributes,
    pub exit_status: i32,
}

impl RawAttributeRecord {
    /// Decodes `smartctl --json --all` output.
    ///
    /// `process_status` is the process exit code, used when the document does
    /// not carry `smartctl.exit_status` itself.
    pub fn from_smartctl_json(bytes: &[u8], process_status: Option<i32>) -> Result<Self, FetchError> {
        let doc: Value = serde_json::from_slice(bytes)
            .map_err(|e| FetchError::ParseError(format!("invalid JSON: {e}")))?;
        let root = doc
            .as_object()
            .ok_or_else(|| FetchError::ParseError("top-level JSON value is not an object".into()))?;

        let exit_status = root
            .get("smartctl")
            .and_then(|s| s.get("exit_status"))
            .and_then(Value::as_i64)
            .map(|v| v as i32)
            .or(process_status)
            .unwrap_or(0);

        if exit_status & EXIT_COMMAND_LINE != 0 {
            return Err(FetchError::ParseError(format!(
                "smartctl rejected the command line: {}",
                error_messages(root)
            )));
        }
        if exit_status & EXIT_DEVICE_OPEN != 0 {
            return Err(FetchError::DeviceUnreadable(error_messages(root)));
        }

        let protocol = root
            .get("device")
            .and_then(|d| d.get("protocol"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let mut interface = InterfaceType::from_protocol(protocol);

        let attributes = if let Some(table) = root
            .get("ata_smart_attributes")
            .and_then(|a| a.get("table"))
            .and_then(Value::as_array)
        {
            interface = InterfaceType::Ata;
            RawAttributes::Ata(decode_ata_table(table))
        } else if let Some(log) = root
            .get("nvme_smart_health_information_log")
            .and_then(Value::as_object)
        {
            interface = InterfaceType::Nvme;
            RawAttributes::Nvme(decode_nvme_log(log))
        } else if interface == InterfaceType::Scsi {
            RawAttributes::Scsi(decode_scsi(root))
        } else {
            RawAttributes::Unknown
        };

        Ok(Self {
            interface,
            identity: decode_identity(root),
            smart_passed: root
                .get("smart_status")
                .and_then(|s| s.get("passed"))
                .and_then(Value::as_bool),
            temperature_celsius: root
                .get("temperature")
                .and_then(|t| t.get("current"))
                .and_then(Value::as_f64),
            power_on_time: section(root, "power_on_time"),
            power_cycle_count: root.get("power_cycle_count").and_then(Value::as_u64),
            attributes,
            exit_status,
        })
    }
}

/// Deserializes one optional section, treating a malformed section as absent.
fn section<T: for<'de> Deserialize<'de>>(root: &Map<String, Value>, key: &str) -> Option<T> {
    let value = root.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Ignoring malformed '{}' section: {}", key, e);
            None
        }
    }
}

fn string_field(root: &Map<String, Value>, key: &str) -> Option<String> {
    root.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn decode_identity(root: &Map<String, Value>) -> DeviceIdentity {
    let model = string_field(root, "model_name")
        .or_else(|| string_field(root, "scsi_model_name"))
        .or_else(|| {
            let product = string_field(root, "product")?;
            Some(match string_field(root, "vendor") {
                Some(vendor) => format!("{vendor} {product}"),
                None => product,
            })
        });

    let wwn = root.get("wwn").and_then(|w| {
        let naa = w.get("naa")?.as_u64()?;
        let oui = w.get("oui")?.as_u64()?;
        let id = w.get("id")?.as_u64()?;
        Some(format!("{naa:x} {oui:06x} {id:09x}"))
    });

    DeviceIdentity {
        model,
        model_family: string_field(root, "model_family"),
        serial_number: string_field(root, "serial_number"),
        firmware_version: string_field(root, "firmware_version")
            .or_else(|| string_field(root, "revision")),
        wwn,
        capacity_bytes: root
            .get("user_capacity")
            .and_then(|c| c.get("bytes"))
            .and_then(Value::as_u64),
    }
}

fn decode_ata_table(table: &[Value]) -> Vec<AtaAttribute> {
    table
        .iter()
        .filter_map(|row| match serde_json::from_value::<AtaAttribute>(row.clone()) {
            Ok(attr) => Some(attr),
            Err(e) => {
                debug!("Skipping malformed ATA attribute row: {}", e);
                None
            }
        })
        .collect()
}

fn decode_nvme_log(log: &Map<String, Value>) -> NvmeHealthLog {
    let fields = log
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
        .collect();
    NvmeHealthLog { fields }
}

fn decode_scsi(root: &Map<String, Value>) -> ScsiCounters {
    let uncorrected = |direction: &str| {
        root.get("scsi_error_counter_log")
            .and_then(|l| l.get(direction))
            .and_then(|d| d.get("total_uncorrected_errors"))
            .and_then(Value::as_u64)
    };
    let cycles = root.get("scsi_start_stop_cycle_counter");

    ScsiCounters {
        grown_defects: root.get("scsi_grown_defect_list").and_then(Value::as_u64),
        read_uncorrected_errors: uncorrected("read"),
        write_uncorrected_errors: uncorrected("write"),
        start_stop_cycles: cycles
            .and_then(|c| c.get("accumulated_start_stop_cycles"))
            .and_then(Value::as_u64),
        load_unload_cycles: cycles
            .and_then(|c| c.get("accumulated_load_unload_cycles"))
            .and_then(Value::as_u64),
    }
}

fn error_messages(root: &Map<String, Value>) -> String {
    let messages: Vec<&str> = root
        .get("smartctl")
        .and_then(|s| s.get("messages"))
        .and_then(Value::as_array)
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.get("string").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        "no diagnostic message".to_string()
    } else {
        messages.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATA_DOC: &str = r#"{
        "smartctl": {"exit_status": 0},
        "device": {"name": "/dev/sda", "type": "sat", "protocol": "ATA"},
        "model_family": "Western Digital Red",
        "model_name": "WDC WD40EFRX-68N32N0",
        "serial_number": "WD-WCC7K0000000",
        "wwn": {"naa": 5, "oui": 5358, "id": 123456789},
        "firmware_version": "82.00A82",
        "user_capacity": {"blocks": 7814037168, "bytes": 4000787030016},
        "smart_status": {"passed": true},
        "ata_smart_attributes": {"table": [
            {"id": 194, "name": "Temperature_Celsius", "value": 117, "worst": 100, "thresh": 0,
             "when_failed": "", "raw": {"value": 35, "string": "35"}},
            {"id": "bogus"},
            {"id": 9, "name": "Power_On_Hours", "value": 52, "worst": 52, "thresh": 0,
             "raw": {"value": 35412, "string": "35412"}}
        ]},
        "temperature": {"current": 35},
        "power_on_time": {"hours": 35412},
        "power_cycle_count": 61
    }"#;

    #[test]
    fn test_decode_ata_document() {
        let record = RawAttributeRecord::from_smartctl_json(ATA_DOC.as_bytes(), None).unwrap();

        assert_eq!(record.interface, InterfaceType::Ata);
        assert_eq!(record.smart_passed, Some(true));
        assert_eq!(record.identity.model.as_deref(), Some("WDC WD40EFRX-68N32N0"));
        assert_eq!(record.identity.wwn.as_deref(), Some("5 0014ee 0075bcd15"));
        assert_eq!(record.identity.capacity_bytes, Some(4000787030016));
        assert_eq!(record.power_cycle_count, Some(61));

        match record.attributes {
            RawAttributes::Ata(rows) => {
                // malformed row is skipped, the rest survives
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].id, 194);
                assert_eq!(rows[0].raw.value, 35);
            }
            other => panic!("expected ATA attributes, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_nvme_document_keeps_scalars_only() {
        let doc = r#"{
            "device": {"name": "/dev/nvme0", "type": "nvme", "protocol": "NVMe"},
            "model_name": "Samsung SSD 980 PRO 1TB",
            "smart_status": {"passed": true},
            "nvme_smart_health_information_log": {
                "critical_warning": 0,
                "temperature": 41,
                "percentage_used": 3,
                "temperature_sensors": [41, 47]
            }
        }"#;
        let record = RawAttributeRecord::from_smartctl_json(doc.as_bytes(), Some(0)).unwrap();

        assert_eq!(record.interface, InterfaceType::Nvme);
        match record.attributes {
            RawAttributes::Nvme(log) => {
                assert_eq!(log.get("temperature"), Some(41.0));
                assert_eq!(log.get("temperature_sensors"), None);
                assert_eq!(log.fields.len(), 3);
            }
            other => panic!("expected NVMe log, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_scsi_document() {
        let doc = r#"{
            "device": {"name": "/dev/sdc", "type": "scsi", "protocol": "SCSI"},
            "vendor": "SEAGATE",
            "product": "ST4000NM0023",
            "revision": "GS0F",
            "smart_status": {"passed": true},
            "scsi_grown_defect_list": 4,
            "scsi_error_counter_log": {"read": {"total_uncorrected_errors": 2}},
            "scsi_start_stop_cycle_counter": {"accumulated_start_stop_cycles": 19}
        }"#;
        let record = RawAttributeRecord::from_smartctl_json(doc.as_bytes(), None).unwrap();

        assert_eq!(record.identity.model.as_deref(), Some("SEAGATE ST4000NM0023"));
        assert_eq!(record.identity.firmware_version.as_deref(), Some("GS0F"));
        match record.attributes {
            RawAttributes::Scsi(c) => {
                assert_eq!(c.grown_defects, Some(4));
                assert_eq!(c.read_uncorrected_errors, Some(2));
                assert_eq!(c.write_uncorrected_errors, None);
                assert_eq!(c.start_stop_cycles, Some(19));
            }
            other => panic!("expected SCSI counters, got {other:?}"),
        }
    }

    #[test]
    fn test_device_open_failure_is_unreadable() {
        let doc = r#"{"smartctl": {"exit_status": 2, "messages": [
            {"string": "Smartctl open device: /dev/sdx failed: No such device", "severity": "error"}
        ]}}"#;
        let err = RawAttributeRecord::from_smartctl_json(doc.as_bytes(), None).unwrap_err();
        assert_eq!(
            err,
            FetchError::DeviceUnreadable("Smartctl open device: /dev/sdx failed: No such device".into())
        );
    }

    #[test]
    fn test_process_status_used_when_document_is_silent() {
        let err = RawAttributeRecord::from_smartctl_json(b"{}", Some(2)).unwrap_err();
        assert_eq!(err.reason(), "device_unreadable");
    }

    #[test]
    fn test_informational_exit_bits_still_decode() {
        // bit 3: disk failing; data is still valid
        let doc = r#"{"smartctl": {"exit_status": 8}, "smart_status": {"passed": false}}"#;
        let record = RawAttributeRecord::from_smartctl_json(doc.as_bytes(), None).unwrap();
        assert_eq!(record.smart_passed, Some(false));
        assert_eq!(record.attributes, RawAttributes::Unknown);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = RawAttributeRecord::from_smartctl_json(b"not json", None).unwrap_err();
        assert_eq!(err.reason(), "parse_error");
        let err = RawAttributeRecord::from_smartctl_json(b"[1,2]", None).unwrap_err();
        assert_eq!(err.reason(), "parse_error");
    }
}
