//! Route Configuration
//!
//! Configures the public HTTP/WebSocket routes and the RPC gateway routes.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::rpc;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the public API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state.clone()))
        // WebSocket endpoint, authenticated by its query string
        .route("/ws", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Create the RPC gateway router, served on its own listener
pub fn create_rpc_router(state: AppState) -> Router {
    rpc::routes(state.clone()).with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Room routes (protected)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/rooms/{room_id}/messages",
            post(handlers::message::send_message),
        )
        .route("/rooms/{room_id}/users", get(handlers::room::get_room_users))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
