//! HTTP endpoint handlers for the exporter.
//!
//! - `/`: HTML landing page
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: plain-text health of the last collection cycle

pub mod health;
pub mod metrics;
pub mod root;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
