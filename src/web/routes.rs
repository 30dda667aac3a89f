//! Web API router construction.

use axum::{
    Router,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::{attendance, status};

/// A full scrape drives a real browser through login and several framesets,
/// with settle delays at every step; give it plenty of room.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/captcha", post(attendance::captcha))
        .route("/attendance", post(attendance::attendance))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(status::home))
        .nest("/api", api_router)
        .with_state(app_state)
        .layer((
            TraceLayer::new_for_http(),
            // The frontend is served from a different origin
            CorsLayer::permissive(),
            TimeoutLayer::new(REQUEST_TIMEOUT),
        ))
}
