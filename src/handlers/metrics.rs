//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request goes through the snapshot cache: it either runs a
//! collection cycle or reuses the snapshot of a cycle that finished within
//! the debounce window.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::collector::Freshness;
use crate::exposition::{self, CONTENT_TYPE};
use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed(prometheus::Error),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        match self {
            MetricsError::EncodingFailed(e) => {
                error!("Failed to encode metrics: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
            }
        }
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let (snapshot, freshness) = state.cache.get_or_collect().await;
    let age = match freshness {
        Freshness::Collected => 0.0,
        Freshness::Cached => state
            .cache
            .latest()
            .map(|(_, age)| age.as_secs_f64())
            .unwrap_or(0.0),
    };

    let body = exposition::render(&snapshot, age).map_err(MetricsError::EncodingFailed)?;

    debug!(
        "Served cycle {} ({:?}) in {:.3}s, {} bytes",
        snapshot.meta.cycle,
        freshness,
        start.elapsed().as_secs_f64(),
        body.len()
    );
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}
