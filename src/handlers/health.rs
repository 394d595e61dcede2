//! Health check endpoint handler.
//!
//! Reports the age and device counts of the last published snapshot. Never
//! starts a collection cycle.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let latest = state.cache.latest();
    let status = match &latest {
        Some((snapshot, _)) if snapshot.discovery_succeeded() => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    let message = match &latest {
        None if state.cache.is_collecting() => "Waiting for first collection cycle (collecting)",
        None => "Waiting for first collection cycle",
        Some((snapshot, _)) if !snapshot.discovery_succeeded() => "Device discovery failed",
        Some(_) if state.cache.is_collecting() => "OK - Collecting",
        Some(_) => "OK",
    };

    let mut body = String::new();
    writeln!(body, "{message}").ok();
    writeln!(body).ok();
    writeln!(body, "Uptime: {}s", state.start_time.elapsed().as_secs()).ok();

    if let Some((snapshot, age)) = &latest {
        writeln!(body, "Last cycle: {}", snapshot.meta.cycle).ok();
        writeln!(body, "Last cycle age: {:.1}s", age.as_secs_f64()).ok();
        writeln!(body, "Last cycle duration: {:.3}s", snapshot.meta.duration.as_secs_f64()).ok();
        writeln!(
            body,
            "Devices: {} attempted, {} succeeded, {} failed",
            snapshot.attempted, snapshot.succeeded, snapshot.failed
        )
        .ok();
        if let Some(e) = &snapshot.meta.discovery_error {
            writeln!(body, "Discovery error: {e}").ok();
        }
        for entry in snapshot.devices.values() {
            if let Some(e) = entry.result.error() {
                writeln!(body, "  {}: {}", entry.device.id(), e).ok();
            }
        }
    }

    debug!("Health check: {} - {}", status, message);
    (status, [("Content-Type", "text/plain; charset=utf-8")], body)
}
