//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check (backward compatible)
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe (store, bus and registry)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Basic health response (backward compatible)
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

/// Individual service health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub store: ServiceHealth,
    pub bus: ServiceHealth,
    pub websocket: WebSocketHealth,
}

/// Health status for individual services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Connection registry health
#[derive(Debug, Serialize)]
pub struct WebSocketHealth {
    pub status: HealthStatus,
    pub active_connections: usize,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Basic health check endpoint (backward compatible)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - checks if the server is running
/// Returns 200 if alive, used by Kubernetes to restart dead pods
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - checks if the server can accept traffic
/// Returns 200 if ready, 503 if the store is unavailable or the registry is closed
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();
    let started_at = SERVER_START_TIME.to_rfc3339();

    let store_health = check_store(&state).await;
    let bus_health = check_bus(&state).await;
    let ws_health = match state.relay.hub().connection_count().await {
        Ok(active_connections) => WebSocketHealth {
            status: HealthStatus::Healthy,
            active_connections,
        },
        Err(_) => WebSocketHealth {
            status: HealthStatus::Unhealthy,
            active_connections: 0,
        },
    };

    let mut overall_status = determine_overall_status(&store_health, &bus_health);
    if ws_health.status == HealthStatus::Unhealthy {
        overall_status = HealthStatus::Unhealthy;
    }

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        started_at,
        checks: HealthChecks {
            store: store_health,
            bus: bus_health,
            websocket: ws_health,
        },
    };

    // Return 503 if unhealthy
    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn check_store(state: &AppState) -> ServiceHealth {
    let start = Instant::now();
    let result = state.store.ping().await.map_err(|e| e.to_string());
    ping_health(start, result)
}

async fn check_bus(state: &AppState) -> ServiceHealth {
    let start = Instant::now();
    let result = state.bus.ping().await.map_err(|e| e.to_string());
    ping_health(start, result)
}

/// A ping either answers (with its round trip recorded) or the collaborator is down.
fn ping_health(start: Instant, result: Result<(), String>) -> ServiceHealth {
    match result {
        Ok(()) => ServiceHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            message: None,
        },
        Err(message) => ServiceHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message),
        },
    }
}

/// A store outage makes the process unready. A bus outage only costs
/// cross-process delivery, so the process keeps serving its own sockets.
fn determine_overall_status(store: &ServiceHealth, bus: &ServiceHealth) -> HealthStatus {
    if store.status == HealthStatus::Unhealthy {
        HealthStatus::Unhealthy
    } else if bus.status == HealthStatus::Unhealthy {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
