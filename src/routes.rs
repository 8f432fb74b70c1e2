//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod changes;
mod snapshot;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        .route("/health", get(health_check))
        // Snapshots
        .route("/api/snapshots", post(snapshot::capture_snapshot))
        .route("/api/snapshots/import", post(snapshot::import_snapshot))
        .route("/api/sources", get(snapshot::list_sources))
        .route("/api/sources/{source}/snapshots", get(snapshot::list_snapshots))
        .route("/api/sources/{source}/snapshots/latest", get(snapshot::get_latest_snapshot))
        .route("/api/sources/{source}/snapshots/{version}", get(snapshot::get_snapshot_version))
        .route(
            "/api/sources/{source}/snapshots/{version}/baseline",
            post(snapshot::set_baseline),
        )
        .route("/api/sources/{source}/prune", post(snapshot::prune_snapshots))
        // Changes
        .route("/api/changes", post(changes::diff_documents))
        .route("/api/sources/{source}/changes", get(changes::diff_snapshots))
        .route("/api/sources/{source}/drift", get(changes::check_drift))
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .server
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
