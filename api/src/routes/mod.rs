//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness check for uptime probes.
//! - `/devices` → the read layer: known devices, per-device series and the
//!   latest process table. This is what the dashboard polls on its refresh
//!   timer.

use axum::Router;
use util::state::AppState;

pub mod devices;
pub mod health;

/// Builds the complete application router for all HTTP endpoints.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health::health_routes())
        .nest("/devices", devices::devices_routes())
        .with_state(app_state)
}
