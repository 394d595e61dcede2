//! SMART Metrics Exporter Library
//!
//! Collects S.M.A.R.T. health data from storage devices through `smartctl`,
//! normalizes the interface-specific attributes (ATA, NVMe, SCSI) onto a
//! fixed metric vocabulary and serves them in the Prometheus text format.
//!
//! # Features
//!
//! - **Per-scrape collection**: every scrape runs one collection cycle, or
//!   reuses the last snapshot within a debounce window
//! - **Failure isolation**: an unreadable or slow device becomes a
//!   `smart_device_error` sample and never fails the scrape
//! - **Bounded fan-out**: device fetches run concurrently under a semaphore,
//!   with per-device and per-cycle deadlines
//! - **Fixture mode**: replayed smartctl output for tests and demos
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use smartmon_exporter::collector::{Collector, CollectorSettings, SnapshotCache};
//! use smartmon_exporter::state::AppState;
//! use smartmon_exporter::tool::{Smartctl, Tool};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let tool = Tool::Smartctl(Smartctl::locate(None, true)?);
//! let collector = Collector::new(Arc::new(tool), CollectorSettings::default());
//! let cache = SnapshotCache::new(collector, Duration::from_secs(60));
//!
//! let app = smartmon_exporter::server::router(Arc::new(AppState::new(cache)), true);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9541").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod device;
pub mod error;
pub mod exposition;
pub mod handlers;
pub mod normalize;
pub mod raw;
pub mod server;
pub mod snapshot;
pub mod state;
pub mod tool;

// Re-export main types for convenience
pub use collector::{Collector, CollectorSettings, Freshness, SnapshotCache};
pub use device::{Device, DeviceFilter, DiscoverySettings, InterfaceType};
pub use error::{FetchError, StartupError};
pub use snapshot::ScrapeSnapshot;
pub use tool::{DiagnosticTool, FixtureTool, Smartctl, Tool, ToolInfo};
