//! Application state shared across all request handlers.

use std::sync::Arc;

use coinpulse_core::processors::Refresher;
use coinpulse_core::stats::StatsQueryService;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Read-side query service.
    pub stats: Arc<StatsQueryService>,
    /// Refresh pipeline, reachable through the manual trigger endpoint.
    pub refresher: Arc<Refresher>,
}

impl AppState {
    /// Create a new AppState over the shared services.
    pub fn new(stats: Arc<StatsQueryService>, refresher: Arc<Refresher>) -> Self {
        Self { stats, refresher }
    }
}
