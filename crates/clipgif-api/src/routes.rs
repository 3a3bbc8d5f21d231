//! HTTP routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{download, health, index, preview, ready, result, upload};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, hide_internal_errors, payload_too_large, request_id, request_logging,
    security_headers,
};
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let max_upload_mb = state.config.max_upload_mb();

    // Uploads stream to disk, so Axum's buffered-body limit is replaced by
    // a hard cap on the raw body.
    let app_routes = Router::new()
        .route("/", get(index).post(upload))
        .route("/result", get(result))
        .route("/gifs/:filename", get(download))
        .route("/preview/:filename", get(preview))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_bytes))
        .layer(middleware::from_fn_with_state(max_upload_mb, payload_too_large))
        .layer(middleware::from_fn_with_state(
            state.config.is_production(),
            hide_internal_errors,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(app_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
