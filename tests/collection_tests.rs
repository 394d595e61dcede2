//! Integration tests for collection cycles against replayed smartctl output.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use smartmon_exporter::collector::{Collector, CollectorSettings, Freshness, SnapshotCache};
use smartmon_exporter::device::{DeviceFilter, DiscoverySettings};
use smartmon_exporter::exposition;
use smartmon_exporter::normalize::MetricName;
use smartmon_exporter::tool::fixture::{FixtureData, FixtureDevice};
use smartmon_exporter::tool::{DiagnosticTool, FixtureTool};
use smartmon_exporter::FetchError;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/disks.json");

fn settings() -> CollectorSettings {
    CollectorSettings {
        discovery: DiscoverySettings {
            sysfs_root: "/nonexistent-sysfs".into(),
            ..DiscoverySettings::default()
        },
        max_concurrency: 2,
        device_timeout: Duration::from_secs(5),
        cycle_timeout: Duration::from_secs(10),
    }
}

fn fixture_tool() -> Arc<FixtureTool> {
    Arc::new(FixtureTool::from_file(Path::new(FIXTURE)).expect("fixture loads"))
}

fn slow_device(name: &str, delay_ms: u64) -> FixtureDevice {
    FixtureDevice {
        name: name.to_string(),
        device_type: "sat".to_string(),
        protocol: "ATA".to_string(),
        delay_ms,
        report: Some(serde_json::json!({
            "device": {"name": name, "type": "sat", "protocol": "ATA"},
            "model_name": "Slow Disk",
            "smart_status": {"passed": true}
        })),
        error: None,
        vanished: false,
    }
}

#[tokio::test]
async fn test_every_device_has_an_entry_despite_failures() {
    let collector = Collector::new(fixture_tool(), settings());
    let snapshot = collector.collect().await;

    assert_eq!(snapshot.attempted, 4);
    assert_eq!(snapshot.succeeded, 3);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.devices.len(), 4);

    let sdb = &snapshot.devices["/dev/sdb"];
    assert_eq!(
        sdb.result.error(),
        Some(&FetchError::DeviceUnreadable("Device is in STANDBY mode".into()))
    );

    // healthy devices keep their full output
    let sda = &snapshot.devices["/dev/sda"];
    let temperature = sda
        .result
        .metrics()
        .iter()
        .find(|m| m.name == MetricName::TemperatureCelsius)
        .expect("sda temperature");
    assert_eq!(temperature.value, 35.0);
}

#[tokio::test]
async fn test_interfaces_share_the_canonical_vocabulary() {
    let collector = Collector::new(fixture_tool(), settings());
    let snapshot = collector.collect().await;

    for device in ["/dev/nvme0", "/dev/sda", "/dev/sdc"] {
        let metrics = snapshot.devices[device].result.metrics();
        for name in [MetricName::Healthy, MetricName::TemperatureCelsius, MetricName::PowerOnHours] {
            assert!(
                metrics.iter().any(|m| m.name == name),
                "{device} is missing {name}"
            );
        }
    }

    let nvme = snapshot.devices["/dev/nvme0"].result.metrics();
    let written = nvme
        .iter()
        .find(|m| m.name == MetricName::WrittenBytesTotal)
        .expect("written bytes");
    assert_eq!(written.value, 2000.0 * 512_000.0);

    let sdc = snapshot.devices["/dev/sdc"].result.metrics();
    let model = sdc[0].label("model");
    assert_eq!(model, Some("SEAGATE ST4000NM0023"));
}

#[tokio::test]
async fn test_exclude_filter_drops_devices() {
    let mut s = settings();
    s.discovery.filter = DeviceFilter::from_patterns(&[], &["^/dev/sd[bc]$".to_string()]).unwrap();
    let collector = Collector::new(fixture_tool(), s);

    let snapshot = collector.collect().await;
    let ids: Vec<&str> = snapshot.devices.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["/dev/nvme0", "/dev/sda"]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_device_times_out_within_deadline() {
    let tool = Arc::new(FixtureTool::new(FixtureData {
        version: None,
        devices: vec![slow_device("/dev/sda", 10), slow_device("/dev/sdb", 600_000)],
    }));
    let collector = Collector::new(tool, settings());

    let start = tokio::time::Instant::now();
    let snapshot = collector.collect().await;

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(snapshot.devices["/dev/sda"].result.is_success());
    assert_eq!(
        snapshot.devices["/dev/sdb"].result.error(),
        Some(&FetchError::Timeout(Duration::from_secs(5)))
    );

    let text = exposition::render(&snapshot, 0.0).unwrap();
    assert!(text.contains(r#"smart_device_error{device="/dev/sdb",model="",reason="timeout"} 1"#));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_scrapes_share_one_cycle() {
    let tool = Arc::new(FixtureTool::new(FixtureData {
        version: None,
        devices: vec![slow_device("/dev/sda", 500)],
    }));
    let cache = Arc::new(SnapshotCache::new(
        Collector::new(Arc::clone(&tool), settings()),
        Duration::from_secs(30),
    ));

    let a = tokio::spawn({
        let cache = Arc::clone(&cache);
        async move { cache.get_or_collect().await }
    });
    let b = tokio::spawn({
        let cache = Arc::clone(&cache);
        async move { cache.get_or_collect().await }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert!(Arc::ptr_eq(&a.0, &b.0));
    assert_eq!(tool.scan_count(), 1);
    assert_eq!(tool.read_count(), 1);

    let mut freshness = [a.1, b.1];
    freshness.sort_by_key(|f| *f == Freshness::Cached);
    assert_eq!(freshness, [Freshness::Collected, Freshness::Cached]);
}

#[tokio::test(start_paused = true)]
async fn test_scrape_timeout_keeps_cycle_running() {
    let tool = Arc::new(FixtureTool::new(FixtureData {
        version: None,
        devices: vec![slow_device("/dev/sda", 15_000)],
    }));
    let mut s = settings();
    s.device_timeout = Duration::from_secs(30);
    s.cycle_timeout = Duration::from_secs(60);
    let cache = SnapshotCache::new(Collector::new(Arc::clone(&tool), s), Duration::from_secs(60));

    // a 10s scrape timeout against a 15s device
    let first = tokio::time::timeout(Duration::from_secs(10), cache.get_or_collect()).await;
    assert!(first.is_err());

    tokio::time::sleep(Duration::from_secs(30)).await;
    let (latest, _) = cache.latest().expect("snapshot published");
    assert!(latest.devices["/dev/sda"].result.is_success());
    assert!(!cache.is_collecting());

    let second = tokio::time::timeout(Duration::from_secs(10), cache.get_or_collect()).await;
    let (_, freshness) = second.expect("served from cache");
    assert_eq!(freshness, Freshness::Cached);
    assert_eq!(tool.scan_count(), 1);
    assert_eq!(tool.read_count(), 1);
}

#[tokio::test]
async fn test_discovery_failure_yields_empty_valid_snapshot() {
    struct BrokenScan;

    impl DiagnosticTool for BrokenScan {
        async fn version(&self) -> Result<smartmon_exporter::ToolInfo, FetchError> {
            Ok(Default::default())
        }

        async fn scan(&self) -> Result<Vec<smartmon_exporter::device::ScannedDevice>, FetchError> {
            Err(FetchError::ToolUnavailable("smartctl: No such file or directory".into()))
        }

        async fn read_device(
            &self,
            _device: &smartmon_exporter::Device,
        ) -> Result<smartmon_exporter::raw::RawAttributeRecord, FetchError> {
            unreachable!("no devices are discovered")
        }
    }

    let collector = Collector::new(Arc::new(BrokenScan), settings());
    let snapshot = collector.collect().await;

    assert!(!snapshot.discovery_succeeded());
    assert_eq!(snapshot.attempted, 0);
    let text = exposition::render(&snapshot, 0.0).unwrap();
    assert!(text.contains("smart_exporter_discovery_success 0"));
}
