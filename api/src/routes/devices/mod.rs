use axum::{Router, routing::get};
use util::state::AppState;

pub mod get;

pub fn devices_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get::list_devices))
        .route("/{device_index}", get(get::device_dashboard))
}
