//! Inline preview of a generated GIF.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Serve a preview copy. Previews are never purged by viewing them.
pub async fn preview(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let path = state.store.locate_preview(&filename).await?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found(filename.clone()))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Cannot stat {}: {}", path.display(), e)))?
        .len();

    Response::builder()
        .header(header::CONTENT_TYPE, "image/gif")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
