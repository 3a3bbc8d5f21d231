//! One-shot GIF download.
//!
//! Serving the artifact is the end of a job. Once the body has been handed
//! to the client the job's files are deleted and the session forgets it.
//! `HEAD` only describes the artifact and leaves the job alone.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method};
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use clipgif_models::Job;
use clipgif_storage::{ArtifactStore, PurgeReport};

use crate::delivery::{CompletionStream, DeliveryOutcome};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::session::{clear_job, ActiveJob};
use crate::state::AppState;

/// Stream a generated GIF as an attachment, then purge its job.
pub async fn download(
    method: Method,
    State(state): State<AppState>,
    Path(filename): Path<String>,
    ActiveJob(session_job): ActiveJob,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Response)> {
    let path = state.store.locate_artifact(&filename).await?;
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(filename));
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Cannot open {}: {}",
                path.display(),
                e
            )));
        }
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Cannot stat {}: {}", path.display(), e)))?
        .len();

    if method == Method::HEAD {
        debug!(filename = %filename, bytes = len, "Describing artifact");
        return Ok((jar, attachment_response(&filename, len, Body::empty())?));
    }

    let store = Arc::clone(&state.store);
    let name = filename.clone();
    let body = CompletionStream::new(ReaderStream::new(file), move |outcome| {
        schedule_purge(store, session_job, name, outcome);
    })
    .with_expected_len(len);

    let response = attachment_response(&filename, len, Body::from_stream(body))?;

    debug!(filename = %filename, bytes = len, "Serving artifact");
    Ok((clear_job(jar), response))
}

fn attachment_response(filename: &str, len: u64, body: Body) -> ApiResult<Response> {
    Response::builder()
        .header(header::CONTENT_TYPE, "image/gif")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CONTENT_LENGTH, len)
        .header(header::CACHE_CONTROL, "no-store")
        .body(body)
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// Run the purge on the runtime; the hook may fire from inside a drop.
fn schedule_purge(
    store: Arc<ArtifactStore>,
    job: Option<Job>,
    filename: String,
    outcome: DeliveryOutcome,
) {
    metrics::record_download(outcome.as_str(), outcome.bytes());

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(purge_delivered(store, job, filename, outcome));
        }
        Err(_) => {
            warn!(
                filename = %filename,
                "No runtime to purge delivered job; leaving it to the sweeper"
            );
        }
    }
}

/// Delete the session's job, then anything matching the served filename.
///
/// Both passes are needed: the session may be gone (another browser, a
/// cleared cookie) or may name a different job than the one downloaded.
pub(crate) async fn purge_delivered(
    store: Arc<ArtifactStore>,
    job: Option<Job>,
    filename: String,
    outcome: DeliveryOutcome,
) -> PurgeReport {
    let mut report = PurgeReport::default();

    if let Some(job) = &job {
        report.merge(store.purge(&job.files).await);
    }
    report.merge(store.purge_by_artifact_name(&filename).await);

    metrics::record_purge(&report);

    if report.is_clean() {
        info!(
            filename = %filename,
            delivery = outcome.as_str(),
            bytes = outcome.bytes(),
            removed = report.removed(),
            "Purged delivered job"
        );
    } else {
        warn!(
            filename = %filename,
            delivery = outcome.as_str(),
            removed = report.removed(),
            failed = report.failed(),
            "Purge of delivered job incomplete"
        );
    }

    report
}
