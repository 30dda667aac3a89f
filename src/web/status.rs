//! Root and health handlers.

use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use tracing::trace;

use crate::state::AppState;

/// `GET /` — service identity.
pub(super) async fn home() -> Json<Value> {
    Json(json!({
        "name": "Attendance API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/health`
pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len(),
    }))
}
