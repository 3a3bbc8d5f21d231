//! Upload form and conversion.

use std::time::Instant;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{info, warn};

use clipgif_models::{allocate, ConversionParams, Job, JobFiles, JobNames};
use clipgif_storage::{sweep_store, PendingUpload};

use crate::error::{ApiError, ApiResult};
use crate::flash;
use crate::metrics;
use crate::state::AppState;
use crate::views;

/// Render the upload form with any flashed message.
pub async fn index(jar: CookieJar) -> (CookieJar, Html<String>) {
    let (jar, message) = flash::take(jar);
    let messages: Vec<String> = message.into_iter().collect();
    (jar, Html(views::upload_page(&messages)))
}

/// Text fields of the upload form, as sent.
#[derive(Debug, Default)]
struct FormFields {
    fps: Option<String>,
    width: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

impl FormFields {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "fps" => self.fps = Some(value),
            "width" => self.width = Some(value),
            "start_time" => self.start_time = Some(value),
            "end_time" => self.end_time = Some(value),
            _ => {}
        }
    }

    fn params(&self) -> ApiResult<ConversionParams> {
        let params = ConversionParams::from_form(
            self.fps.as_deref(),
            self.width.as_deref(),
            self.start_time.as_deref(),
            self.end_time.as_deref(),
        )?;
        params.validate()?;
        Ok(params)
    }
}

/// A video field written to a pending upload.
struct ReceivedVideo {
    upload: PendingUpload,
    names: JobNames,
    display_name: String,
}

/// Accept an upload, convert it, and send the client to the result page.
pub async fn upload(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> ApiResult<(CookieJar, Redirect)> {
    let swept = sweep_store(&state.store, state.retention.full_max_age).await;
    metrics::record_sweep("full", &swept);

    let max_mb = state.config.max_upload_mb();
    let mut fields = FormFields::default();
    let mut video: Option<ReceivedVideo> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_mb))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" if video.is_none() => {
                video = Some(receive_video(&state, field, max_mb).await?);
            }
            "fps" | "width" | "start_time" | "end_time" => {
                let value = field.text().await.map_err(|e| multipart_error(e, max_mb))?;
                fields.set(&name, value);
            }
            _ => {}
        }
    }

    let Some(video) = video else {
        metrics::record_upload("rejected");
        return Err(ApiError::validation("No file part"));
    };

    let params = match fields.params() {
        Ok(params) => params,
        Err(e) => {
            video.upload.abort().await;
            metrics::record_upload("rejected");
            return Err(e);
        }
    };

    let job = convert(&state, video, params).await?;
    info!(
        job_id = %job.job_id,
        artifact = %job.artifact_filename,
        size_bytes = job.size_bytes,
        "Job ready for download"
    );
    metrics::record_upload("converted");

    let jar = jar.add(state.sessions.job_cookie(&job)?);
    Ok((jar, Redirect::to("/result")))
}

/// Validate the file name and stream the field to disk.
///
/// The name is checked before any byte is written. On any error the
/// pending upload is dropped, which removes its partial file.
async fn receive_video(
    state: &AppState,
    mut field: Field<'_>,
    max_mb: usize,
) -> ApiResult<ReceivedVideo> {
    let display_name = field.file_name().unwrap_or_default().to_string();
    let names = allocate(&display_name, Utc::now())
        .inspect_err(|_| metrics::record_upload("rejected"))?;

    let mut upload = state.store.begin_upload(&names.raw_filename).await?;
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_mb))? {
        upload.write_chunk(&chunk).await?;
    }

    info!(
        job_id = %names.job_id,
        bytes = upload.bytes_written(),
        "Received upload"
    );

    Ok(ReceivedVideo {
        upload,
        names,
        display_name,
    })
}

/// Commit the upload, run the transcoder and publish the preview.
async fn convert(
    state: &AppState,
    video: ReceivedVideo,
    params: ConversionParams,
) -> ApiResult<Job> {
    let ReceivedVideo {
        upload,
        names,
        display_name,
    } = video;

    let artifact_path = state.store.resolve_artifact(&names.artifact_filename)?;
    let raw_path = upload.commit().await?;

    let started = Instant::now();
    if let Err(e) = state.transcoder.convert(&raw_path, &artifact_path, &params).await {
        metrics::record_conversion("failed", started.elapsed().as_secs_f64());
        let outcome = state.store.remove_upload(&raw_path).await;
        warn!(job_id = %names.job_id, raw = %outcome, "Conversion failed: {}", e);
        metrics::record_upload("failed");
        return Err(e.into());
    }
    metrics::record_conversion("succeeded", started.elapsed().as_secs_f64());

    let mut files = JobFiles {
        raw_path,
        artifact_path,
        preview_path: state.store.preview_dir().join(&names.artifact_filename),
    };

    match publish(state, &names, &mut files).await {
        Ok(size_bytes) => Ok(Job::new(&names, display_name, size_bytes, files, params)),
        Err(e) => {
            let report = state.store.purge(&files).await;
            warn!(
                job_id = %names.job_id,
                removed = report.removed(),
                "Discarded job after publish failure: {}",
                e
            );
            metrics::record_upload("failed");
            Err(e)
        }
    }
}

async fn publish(state: &AppState, names: &JobNames, files: &mut JobFiles) -> ApiResult<u64> {
    files.preview_path = state
        .store
        .publish_preview(&files.artifact_path, &names.artifact_filename)
        .await?;

    let meta = tokio::fs::metadata(&files.artifact_path).await.map_err(|e| {
        ApiError::internal(format!(
            "Cannot measure {}: {}",
            files.artifact_path.display(),
            e
        ))
    })?;
    Ok(meta.len())
}

fn multipart_error(e: MultipartError, max_mb: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        metrics::record_upload("too_large");
        ApiError::PayloadTooLarge(max_mb)
    } else {
        metrics::record_upload("rejected");
        ApiError::validation(format!("Invalid upload: {}", e.body_text()))
    }
}
