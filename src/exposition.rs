//! Prometheus text exposition of a snapshot.
//!
//! A fresh registry is built for every render, so devices that disappeared
//! between cycles leave no stale series behind.

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;

use crate::normalize::{MetricKind, MetricName, NormalizedMetric};
use crate::snapshot::ScrapeSnapshot;

/// Content type of the rendered text.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Exporter version reported by `smart_exporter_build_info`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build timestamp reported by `smart_exporter_build_info`.
pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

fn register_family(
    registry: &Registry,
    name: MetricName,
    samples: &[&NormalizedMetric],
) -> Result<(), prometheus::Error> {
    let opts = Opts::new(name.as_str(), name.help());
    let labels = name.label_names();

    match name.kind() {
        MetricKind::Gauge => {
            let family = GaugeVec::new(opts, &labels)?;
            for m in samples {
                let values: Vec<&str> = m.label_values.iter().map(String::as_str).collect();
                family.get_metric_with_label_values(values.as_slice())?.set(m.value);
            }
            registry.register(Box::new(family))?;
        }
        MetricKind::Counter => {
            let family = CounterVec::new(opts, &labels)?;
            for m in samples {
                let values: Vec<&str> = m.label_values.iter().map(String::as_str).collect();
                family.get_metric_with_label_values(values.as_slice())?.inc_by(m.value);
            }
            registry.register(Box::new(family))?;
        }
    }
    Ok(())
}

fn register_self_metrics(
    registry: &Registry,
    snapshot: &ScrapeSnapshot,
    snapshot_age_secs: f64,
) -> Result<(), prometheus::Error> {
    let devices = GaugeVec::new(
        Opts::new("smart_exporter_devices", "Devices handled by the last collection cycle"),
        &["state"],
    )?;
    devices.with_label_values(&["attempted"]).set(snapshot.attempted as f64);
    devices.with_label_values(&["succeeded"]).set(snapshot.succeeded as f64);
    devices.with_label_values(&["failed"]).set(snapshot.failed as f64);
    registry.register(Box::new(devices))?;

    let duration = prometheus::Gauge::new(
        "smart_exporter_collection_duration_seconds",
        "Duration of the last collection cycle in seconds",
    )?;
    duration.set(snapshot.meta.duration.as_secs_f64());
    registry.register(Box::new(duration))?;

    let last = prometheus::Gauge::new(
        "smart_exporter_last_collection_timestamp_seconds",
        "Unix time the last collection cycle started",
    )?;
    last.set(snapshot.meta.collected_at.timestamp_millis() as f64 / 1000.0);
    registry.register(Box::new(last))?;

    let age = prometheus::Gauge::new(
        "smart_exporter_snapshot_age_seconds",
        "Age of the served snapshot in seconds (non-zero when served from cache)",
    )?;
    age.set(snapshot_age_secs);
    registry.register(Box::new(age))?;

    let discovery = prometheus::Gauge::new(
        "smart_exporter_discovery_success",
        "Whether device discovery succeeded in the last cycle (1 = yes)",
    )?;
    discovery.set(if snapshot.discovery_succeeded() { 1.0 } else { 0.0 });
    registry.register(Box::new(discovery))?;

    let collections = prometheus::Counter::new(
        "smart_exporter_collections_total",
        "Collection cycles run since the exporter started",
    )?;
    collections.inc_by(snapshot.meta.cycle as f64);
    registry.register(Box::new(collections))?;

    let build_info = GaugeVec::new(
        Opts::new("smart_exporter_build_info", "Exporter build information"),
        &["version", "build_timestamp"],
    )?;
    build_info.with_label_values(&[VERSION, BUILD_TIMESTAMP]).set(1.0);
    registry.register(Box::new(build_info))?;

    if let Some(tool) = &snapshot.meta.tool {
        let info = GaugeVec::new(
            Opts::new("smart_smartctl_info", "smartctl version information"),
            &["version", "svn_revision", "platform_info", "build_info"],
        )?;
        info.with_label_values(&[
            tool.version.as_str(),
            tool.svn_revision.as_str(),
            tool.platform_info.as_str(),
            tool.build_info.as_str(),
        ])
        .set(1.0);
        registry.register(Box::new(info))?;
    }

    Ok(())
}

/// Builds a registry holding every sample of the snapshot plus the exporter's
/// own metrics.
pub fn registry_for(snapshot: &ScrapeSnapshot, snapshot_age_secs: f64) -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();

    let mut families: BTreeMap<MetricName, Vec<&NormalizedMetric>> = BTreeMap::new();
    for m in snapshot.metrics() {
        families.entry(m.name).or_default().push(m);
    }
    for (name, samples) in &families {
        register_family(&registry, *name, samples)?;
    }

    register_self_metrics(&registry, snapshot, snapshot_age_secs)?;
    Ok(registry)
}

/// Renders a snapshot as Prometheus text.
pub fn render(snapshot: &ScrapeSnapshot, snapshot_age_secs: f64) -> Result<String, prometheus::Error> {
    let registry = registry_for(snapshot, snapshot_age_secs)?;
    let mut buffer = Vec::with_capacity(64 * 1024);
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
