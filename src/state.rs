//! Application state shared by the HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::collector::SnapshotCache;
use crate::tool::Tool;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Single-flight snapshot cache; the only shared mutable state.
    pub cache: SnapshotCache<Tool>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: SnapshotCache<Tool>) -> Self {
        Self {
            cache,
            start_time: Instant::now(),
        }
    }
}
