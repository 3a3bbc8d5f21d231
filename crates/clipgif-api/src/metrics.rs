//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use clipgif_storage::{PurgeReport, SweepReport};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "clipgif_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "clipgif_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "clipgif_http_requests_in_flight";

    // Job lifecycle
    pub const UPLOADS_TOTAL: &str = "clipgif_uploads_total";
    pub const CONVERSION_DURATION_SECONDS: &str = "clipgif_conversion_duration_seconds";
    pub const DOWNLOADS_TOTAL: &str = "clipgif_downloads_total";
    pub const DOWNLOAD_BYTES_TOTAL: &str = "clipgif_download_bytes_total";

    // Cleanup
    pub const PURGED_FILES_TOTAL: &str = "clipgif_purged_files_total";
    pub const PURGE_FAILURES_TOTAL: &str = "clipgif_purge_failures_total";
    pub const SWEPT_FILES_TOTAL: &str = "clipgif_swept_files_total";
    pub const SWEEP_FAILURES_TOTAL: &str = "clipgif_sweep_failures_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the outcome of an upload request.
pub fn record_upload(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
}

/// Record FFmpeg conversion duration.
pub fn record_conversion(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    histogram!(names::CONVERSION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how a download body ended.
pub fn record_download(outcome: &str, bytes: u64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::DOWNLOADS_TOTAL, &labels).increment(1);
    counter!(names::DOWNLOAD_BYTES_TOTAL).increment(bytes);
}

/// Record a post-download purge.
pub fn record_purge(report: &PurgeReport) {
    counter!(names::PURGED_FILES_TOTAL).increment(report.removed() as u64);
    counter!(names::PURGE_FAILURES_TOTAL).increment(report.failed() as u64);
}

/// Record a retention sweep.
pub fn record_sweep(kind: &str, report: &SweepReport) {
    let labels = [("sweep", kind.to_string())];
    counter!(names::SWEPT_FILES_TOTAL, &labels).increment(report.removed as u64);
    counter!(names::SWEEP_FAILURES_TOTAL, &labels).increment(report.failed as u64);
}

/// Collapse per-file paths so labels stay bounded.
fn sanitize_path(path: &str) -> String {
    for prefix in ["/gifs/", "/preview/"] {
        if path.starts_with(prefix) && path.len() > prefix.len() {
            return format!("{}:filename", prefix);
        }
    }
    match path {
        "/" | "/result" | "/health" | "/healthz" | "/ready" | "/metrics" => path.to_string(),
        _ => "other".to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
