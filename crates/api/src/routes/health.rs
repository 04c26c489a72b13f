//! Root-level liveness probe.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"empty"` before any valid event has been loaded.
    pub status: &'static str,
    pub version: &'static str,
    pub generation: u64,
    pub event_count: usize,
    /// `json_file` or `in_memory`.
    pub source: &'static str,
    /// Live receivers on the change bus; 0 means the worker is gone.
    pub bus_receivers: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let view = state.timeline.view();
    Json(HealthResponse {
        status: if view.event_count == 0 { "empty" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        generation: view.generation,
        event_count: view.event_count,
        source: state.source.kind(),
        bus_receivers: state.event_bus.receiver_count(),
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
