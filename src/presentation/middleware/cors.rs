//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

/// Parse configured origins, skipping entries that are not valid header values.
fn parse_origins(settings: &CorsSettings) -> Vec<HeaderValue> {
    settings
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect()
}

/// Create CORS layer from settings. No valid origin means any origin.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    let origins = parse_origins(settings);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(origins)
            .max_age(Duration::from_secs(3600))
    }
}
