//! HTTP router construction.

use axum::{routing::get, Router};

use crate::handlers::{health_handler, metrics_handler, root_handler};
use crate::state::SharedState;

/// Builds the router serving `/`, `/metrics` and (optionally) `/health`.
pub fn router(state: SharedState, enable_health: bool) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if enable_health {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}
