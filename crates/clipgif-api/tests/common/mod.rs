//! Shared fixtures for router tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use clipgif_api::{create_router, ApiConfig, AppState};
use clipgif_media::{MediaError, MediaResult, Transcoder};
use clipgif_models::ConversionParams;
use clipgif_storage::{ArtifactStore, RetentionPolicy, StoreConfig};

pub const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00\
!\xf9\x04\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

const BOUNDARY: &str = "clipgif-test-boundary";

/// Transcoder that writes a fixed GIF, or fails like FFmpeg would.
#[derive(Default)]
pub struct FakeTranscoder {
    fail_with: Option<String>,
    pub calls: Mutex<Vec<ConversionParams>>,
}

impl FakeTranscoder {
    pub fn failing(stderr: &str) -> Self {
        Self {
            fail_with: Some(stderr.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        params: &ConversionParams,
    ) -> MediaResult<()> {
        self.calls.lock().unwrap().push(params.clone());
        params.validate()?;
        assert!(input.exists(), "transcoder called before upload was committed");

        if let Some(stderr) = &self.fail_with {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr.clone()),
                Some(1),
            ));
        }

        tokio::fs::write(output, GIF_BYTES).await?;
        Ok(())
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
    pub transcoder: Arc<FakeTranscoder>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(FakeTranscoder::default(), 1024 * 1024).await
    }

    pub async fn with(transcoder: FakeTranscoder, max_upload_bytes: usize) -> Self {
        let config = ApiConfig {
            max_upload_bytes,
            ..Default::default()
        };
        Self::with_config(transcoder, config).await
    }

    pub async fn with_config(transcoder: FakeTranscoder, config: ApiConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(StoreConfig::under(dir.path())).await.unwrap();
        let config = ApiConfig {
            session_secret: Some("test-secret".to_string()),
            ..config
        };

        let transcoder = Arc::new(transcoder);
        let state =
            AppState::with_parts(config, store, transcoder.clone(), RetentionPolicy::default());
        let router = create_router(state.clone(), None);

        Self {
            dir,
            state,
            router,
            transcoder,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// POST a multipart form to `/`.
    pub async fn upload(
        &self,
        file: Option<(&str, &[u8])>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = multipart_body(file, fields);
        let request = Request::post("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Upload a small valid video and return the session cookie.
    pub async fn upload_ok(&self, name: &str) -> String {
        let response = self.upload(Some((name, b"fake video bytes")), &[("fps", "10")]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/result");
        cookie_pair(&response, "clipgif_job").expect("session cookie set")
    }

    pub fn upload_dir(&self) -> &Path {
        self.state.store.upload_dir()
    }

    pub fn output_dir(&self) -> &Path {
        self.state.store.output_dir()
    }

    pub fn preview_dir(&self) -> &Path {
        self.state.store.preview_dir()
    }

    /// Visible file names under `dir`, sorted.
    pub fn files_in(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn all_files(&self) -> Vec<String> {
        [self.upload_dir(), self.output_dir(), self.preview_dir()]
            .iter()
            .flat_map(|d| self.files_in(d))
            .collect()
    }

    /// Wait for background purges to empty every directory.
    pub async fn wait_until_empty(&self) {
        for _ in 0..200 {
            if self.all_files().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("files left behind: {:?}", self.all_files());
    }
}

pub fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

/// `name=value` of a cookie set by the response, if any.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .map(|v| v.split(';').next().unwrap().to_string())
}

/// Decoded flash message set by the response.
pub fn flash_message(response: &Response<Body>) -> Option<String> {
    let pair = cookie_pair(response, "clipgif_flash")?;
    let value = pair.split_once('=')?.1;
    Some(urlencoding::decode(value).ok()?.into_owned())
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Name of the single GIF in the output directory.
pub fn artifact_name(app: &TestApp) -> String {
    let names = app.files_in(app.output_dir());
    assert_eq!(names.len(), 1, "expected one artifact, found {:?}", names);
    names.into_iter().next().unwrap()
}
