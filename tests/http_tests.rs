//! End-to-end tests of the HTTP surface on an ephemeral port.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use smartmon_exporter::collector::{Collector, CollectorSettings, SnapshotCache};
use smartmon_exporter::device::DiscoverySettings;
use smartmon_exporter::server;
use smartmon_exporter::state::{AppState, SharedState};
use smartmon_exporter::tool::{FixtureTool, Tool};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/disks.json");

async fn start_server(debounce: Duration, enable_health: bool) -> (SocketAddr, SharedState) {
    let tool = Tool::Fixture(FixtureTool::from_file(Path::new(FIXTURE)).unwrap());
    let settings = CollectorSettings {
        discovery: DiscoverySettings {
            sysfs_root: "/nonexistent-sysfs".into(),
            ..DiscoverySettings::default()
        },
        ..CollectorSettings::default()
    };
    let cache = SnapshotCache::new(Collector::new(Arc::new(tool), settings), debounce);
    let state = Arc::new(AppState::new(cache));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(Arc::clone(&state), enable_health);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// Sends a bare HTTP/1.1 GET and returns (status code, headers, body).
async fn get(addr: SocketAddr, path: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let (head, body) = response.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    (status, head.to_lowercase(), body.to_string())
}

fn scan_count(state: &SharedState) -> u64 {
    match state.cache.collector().tool().as_ref() {
        Tool::Fixture(f) => f.scan_count(),
        Tool::Smartctl(_) => unreachable!("tests run against fixtures"),
    }
}

#[tokio::test]
async fn test_metrics_endpoint_serves_exposition() {
    let (addr, _) = start_server(Duration::from_secs(60), true).await;

    let (status, headers, body) = get(addr, "/metrics").await;
    assert_eq!(status, 200);
    assert!(headers.contains("content-type: text/plain; version=0.0.4"), "{headers}");
    assert!(body.contains(r#"smart_healthy{device="/dev/sda",model="WDC WD40EFRX-68N32N0"} 1"#));
    assert!(body.contains(r#"smart_device_error{device="/dev/sdb",model="",reason="device_unreadable"} 1"#));
    assert!(body.contains(r#"smart_exporter_devices{state="attempted"} 4"#));
    assert!(body.contains(r#"smart_smartctl_exit_status{device="/dev/sda",model="WDC WD40EFRX-68N32N0"} 0"#));
    let nvme_info = body
        .lines()
        .find(|l| l.starts_with(r#"smart_device_info{device="/dev/nvme0""#))
        .expect("nvme device info");
    assert!(nvme_info.contains(r#"interface="nvme""#), "{nvme_info}");
    assert!(nvme_info.contains(r#"type="nvme""#), "{nvme_info}");
}

#[tokio::test]
async fn test_scrapes_within_debounce_reuse_snapshot() {
    let (addr, state) = start_server(Duration::from_secs(60), true).await;

    let (first, second) = tokio::join!(get(addr, "/metrics"), get(addr, "/metrics"));
    assert_eq!(first.0, 200);
    assert_eq!(second.0, 200);
    assert_eq!(scan_count(&state), 1);
}

#[tokio::test]
async fn test_zero_debounce_collects_per_scrape() {
    let (addr, state) = start_server(Duration::ZERO, true).await;

    get(addr, "/metrics").await;
    get(addr, "/metrics").await;
    assert_eq!(scan_count(&state), 2);
}

#[tokio::test]
async fn test_health_reports_unavailable_before_first_cycle() {
    let (addr, _) = start_server(Duration::from_secs(60), true).await;

    let (status, _, body) = get(addr, "/health").await;
    assert_eq!(status, 503);
    assert!(body.starts_with("Waiting for first collection cycle"));

    get(addr, "/metrics").await;
    let (status, _, body) = get(addr, "/health").await;
    assert_eq!(status, 200);
    assert!(body.contains("Devices: 4 attempted, 3 succeeded, 1 failed"), "{body}");
}

#[tokio::test]
async fn test_health_can_be_disabled() {
    let (addr, _) = start_server(Duration::from_secs(60), false).await;
    let (status, _, _) = get(addr, "/health").await;
    assert_eq!(status, 404);

    let (status, _, body) = get(addr, "/").await;
    assert_eq!(status, 200);
    assert!(body.contains("/metrics"));
}
