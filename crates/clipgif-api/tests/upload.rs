//! Upload, validation and result page.

mod common;

use axum::http::{header, StatusCode};

use clipgif_api::ApiConfig;

use common::*;

#[tokio::test]
async fn test_upload_then_result_shows_job() {
    let app = TestApp::new().await;

    let cookie = app.upload_ok("My Holiday.mp4").await;

    let artifact = artifact_name(&app);
    assert!(artifact.ends_with("_My_Holiday.gif"), "{}", artifact);
    assert_eq!(app.files_in(app.preview_dir()), vec![artifact.clone()]);
    let raw = app.files_in(app.upload_dir());
    assert_eq!(raw.len(), 1);
    assert!(raw[0].ends_with("_My_Holiday.mp4"));
    assert!(std::fs::metadata(app.output_dir().join(&artifact)).unwrap().len() > 0);

    let response = app.get("/result", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("My Holiday.mp4"));
    assert!(page.contains(&format!("/gifs/{}", artifact)));
    assert!(page.contains(&format!("/preview/{}", artifact)));
}

#[tokio::test]
async fn test_dotted_names_convert_and_download() {
    let app = TestApp::new().await;

    let cookie = app.upload_ok("my..clip.mp4").await;

    let artifact = artifact_name(&app);
    assert!(artifact.ends_with("_my.clip.gif"), "{}", artifact);

    let response = app.get(&format!("/preview/{}", artifact), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/gifs/{}", artifact), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, GIF_BYTES);
    app.wait_until_empty().await;
}

#[tokio::test]
async fn test_form_values_reach_transcoder() {
    let app = TestApp::new().await;

    let response = app
        .upload(
            Some(("clip.mov", b"bytes")),
            &[("fps", "12"), ("width", "320"), ("start_time", "2.0"), ("end_time", "5.0")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let calls = app.transcoder.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let params = &calls[0];
    assert_eq!(params.fps, 12);
    assert_eq!(params.width, Some(320));
    let window = params.trim_window();
    assert_eq!(window.seek, Some(2.0));
    assert_eq!(window.duration, Some(3.0));
}

#[tokio::test]
async fn test_blank_fields_use_defaults() {
    let app = TestApp::new().await;

    let response = app
        .upload(
            Some(("clip.webm", b"bytes")),
            &[("fps", ""), ("width", "wide"), ("start_time", ""), ("end_time", "")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/result");

    let calls = app.transcoder.calls.lock().unwrap().clone();
    assert_eq!(calls[0].fps, 10);
    assert_eq!(calls[0].width, None);
    assert_eq!(calls[0].trim_window().duration, None);
}

#[tokio::test]
async fn test_disallowed_extensions_write_nothing() {
    let app = TestApp::new().await;

    for name in ["clip.exe", "clip.txt", "noextension"] {
        let response = app.upload(Some((name, b"MZ\x90\x00")), &[]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", name);
        assert_eq!(location(&response), "/");
        let message = flash_message(&response).unwrap();
        assert!(message.starts_with("Invalid file type. Allowed types: webm"), "{}", message);
        assert!(cookie_pair(&response, "clipgif_job").is_none());
    }

    assert!(app.all_files().is_empty());
    assert_eq!(app.transcoder.call_count(), 0);
}

#[tokio::test]
async fn test_missing_file_is_rejected() {
    let app = TestApp::new().await;

    let response = app.upload(None, &[("fps", "10")]).await;
    assert_eq!(flash_message(&response).as_deref(), Some("No file part"));

    let response = app.upload(Some(("", b"")), &[]).await;
    assert_eq!(flash_message(&response).as_deref(), Some("No selected file"));

    assert!(app.all_files().is_empty());
}

#[tokio::test]
async fn test_bad_start_time_persists_nothing() {
    let app = TestApp::new().await;

    let response = app
        .upload(Some(("clip.mp4", b"video")), &[("start_time", "abc")])
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let flash = cookie_pair(&response, "clipgif_flash").unwrap();
    assert_eq!(
        flash_message(&response).as_deref(),
        Some("Invalid time format. Please use seconds (e.g., 10.5)")
    );
    assert!(app.all_files().is_empty());
    assert_eq!(app.transcoder.call_count(), 0);

    // The form is shown again with the message, once.
    let response = app.get("/", Some(&flash)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("clipgif_flash="));
    assert!(cleared);
    let page = body_text(response).await;
    assert!(page.contains("Invalid time format"));
    assert!(page.contains("name=\"video\""));
}

#[tokio::test]
async fn test_end_before_start_rejected() {
    let app = TestApp::new().await;

    let response = app
        .upload(
            Some(("clip.mp4", b"video")),
            &[("start_time", "5"), ("end_time", "2")],
        )
        .await;

    assert_eq!(flash_message(&response).as_deref(), Some("End time must be after start time"));
    assert!(app.all_files().is_empty());
}

#[tokio::test]
async fn test_conversion_failure_removes_raw_upload() {
    let transcoder = FakeTranscoder::failing("moov atom not found\nInvalid data found");
    let app = TestApp::with(transcoder, 1024 * 1024).await;

    let response = app.upload(Some(("broken.mp4", b"not a video")), &[]).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert_eq!(
        flash_message(&response).as_deref(),
        Some("Conversion failed: moov atom not found\nInvalid data found")
    );
    assert!(cookie_pair(&response, "clipgif_job").is_none());
    assert_eq!(app.transcoder.call_count(), 1);
    assert!(app.all_files().is_empty());
}

#[tokio::test]
async fn test_storage_failure_detail_hidden_in_production() {
    for (environment, shows_detail) in [("development", true), ("production", false)] {
        let config = ApiConfig {
            environment: environment.to_string(),
            ..Default::default()
        };
        let app = TestApp::with_config(FakeTranscoder::default(), config).await;
        std::fs::remove_dir(app.upload_dir()).unwrap();

        let response = app.upload(Some(("clip.mp4", b"bytes")), &[]).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", environment);
        let page = body_text(response).await;
        let upload_dir = app.upload_dir().display().to_string();
        assert_eq!(page.contains(&upload_dir), shows_detail, "{}: {}", environment, page);
        if !shows_detail {
            assert!(page.contains("An internal error occurred"));
        }
        assert_eq!(app.transcoder.call_count(), 0);
    }
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = TestApp::with(FakeTranscoder::default(), 1024 * 1024).await;
    let big = vec![0u8; 1024 * 1024 + 512 * 1024];

    let response = app.upload(Some(("big.mp4", &big)), &[]).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let page = body_text(response).await;
    assert!(page.contains("File too large. Maximum size is 1MB"));
    assert!(app.all_files().is_empty());
    assert_eq!(app.transcoder.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_without_length_rejected() {
    use axum::body::Body;
    use axum::http::Request;

    let app = TestApp::with(FakeTranscoder::default(), 1024 * 1024).await;
    let big = vec![0u8; 2 * 1024 * 1024];
    let body = multipart_body(Some(("big.mp4", &big)), &[]);

    let request = Request::post("/")
        .header(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=clipgif-test-boundary",
        )
        .body(Body::from_stream(futures_util::stream::iter(
            body.chunks(64 * 1024)
                .map(|c| Ok::<_, std::io::Error>(c.to_vec()))
                .collect::<Vec<_>>(),
        )))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_text(response).await.contains("Maximum size is 1MB"));
    assert!(app.all_files().is_empty());
}

#[tokio::test]
async fn test_result_without_session_redirects() {
    let app = TestApp::new().await;

    let response = app.get("/result", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_tampered_session_is_ignored() {
    let app = TestApp::new().await;
    let cookie = app.upload_ok("clip.mp4").await;

    let forged = format!("{}x", cookie);
    let response = app.get("/result", Some(&forged)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.get("/result", Some("clipgif_job=e30.AAAA")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let app = TestApp::new().await;
    let first = app.upload_ok("first.mp4").await;
    let second = app.upload_ok("second.mp4").await;

    let page = body_text(app.get("/result", Some(&first)).await).await;
    assert!(page.contains("first.mp4"));
    assert!(!page.contains("second.mp4"));

    let page = body_text(app.get("/result", Some(&second)).await).await;
    assert!(page.contains("second.mp4"));
}
