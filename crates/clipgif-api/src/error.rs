//! API error types.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use thiserror::Error;
use tracing::{error, warn};

use clipgif_media::MediaError;
use clipgif_models::{FilenameError, ParamsError};
use clipgif_storage::StorageError;

use crate::flash;
use crate::views;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad form input. The user is sent back to the form with the message.
    #[error("{0}")]
    Validation(String),

    /// FFmpeg rejected the upload. Carries its diagnostic text.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body over the limit, in megabytes.
    #[error("File too large. Maximum size is {0}MB")]
    PayloadTooLarge(usize),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conversion(_) => StatusCode::SEE_OTHER,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(name) => Self::NotFound(name),
            other => Self::Storage(other),
        }
    }
}

impl From<FilenameError> for ApiError {
    fn from(e: FilenameError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ParamsError> for ApiError {
    fn from(e: ParamsError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidParams(p) => Self::Validation(p.to_string()),
            e @ MediaError::FfmpegNotFound => Self::Internal(e.to_string()),
            other => Self::Conversion(other.diagnostic()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ApiError::Validation(_) | ApiError::Conversion(_) => {
                warn!("Upload rejected: {}", self);
                let jar = CookieJar::new().add(flash::cookie(&self.to_string()));
                (jar, Redirect::to("/")).into_response()
            }
            ApiError::PayloadTooLarge(_) => {
                let message = self.to_string();
                (status, Html(views::upload_page(&[message]))).into_response()
            }
            ApiError::NotFound(_) => {
                (status, Html(views::error_page(status, "File not found"))).into_response()
            }
            ApiError::Internal(_) | ApiError::Storage(_) => {
                error!("Request failed: {}", self);
                // Production deployments strip this detail in `hide_internal_errors`.
                (status, Html(views::error_page(status, &self.to_string()))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_map_to_conversion() {
        let err: ApiError =
            MediaError::ffmpeg_failed("exit 1", Some("moov atom not found".into()), Some(1)).into();
        assert_eq!(err.to_string(), "Conversion failed: moov atom not found");
        assert_eq!(err.status_code(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_payload_too_large_message() {
        let err = ApiError::PayloadTooLarge(100);
        assert_eq!(err.to_string(), "File too large. Maximum size is 100MB");
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_validation_redirects_with_flash() {
        let response = ApiError::validation("No selected file").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");
        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("clipgif_flash="));
    }
}
