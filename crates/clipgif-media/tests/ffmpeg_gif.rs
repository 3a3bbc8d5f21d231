//! End-to-end conversion against a real FFmpeg.
//!
//! Returns early when `ffmpeg`/`ffprobe` are not installed.

use std::path::Path;

use clipgif_media::{
    check_ffmpeg, check_ffprobe, probe_media, FfmpegCommand, FfmpegGifTranscoder, FfmpegRunner,
    MediaError, Transcoder,
};
use clipgif_models::ConversionParams;
use tempfile::TempDir;

fn ffmpeg_available() -> bool {
    check_ffmpeg().is_ok() && check_ffprobe().is_ok()
}

/// Render a synthetic 3-second 640x360 clip.
async fn make_test_clip(path: &Path) {
    let cmd = FfmpegCommand::new("testsrc=duration=3:size=640x360:rate=25", path)
        .input_arg("-f")
        .input_arg("lavfi")
        .output_args(["-c:v", "mpeg4", "-pix_fmt", "yuv420p"]);
    FfmpegRunner::new().run(&cmd).await.unwrap();
}

#[tokio::test]
async fn test_trimmed_scaled_gif() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg/ffprobe not installed");
        return;
    }

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    let output = dir.path().join("clip.gif");
    make_test_clip(&input).await;

    let params = ConversionParams {
        fps: 10,
        width: Some(320),
        start_time: Some(0.0),
        end_time: Some(2.0),
    };
    FfmpegGifTranscoder::default()
        .convert(&input, &output, &params)
        .await
        .unwrap();

    let info = probe_media(&output).await.unwrap();
    assert_eq!(info.codec, "gif");
    assert!(info.width <= 320, "width {}", info.width);
    assert!((info.duration - 2.0).abs() < 0.3, "duration {}", info.duration);
}

#[tokio::test]
async fn test_garbage_input_reports_ffmpeg_diagnostic() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg/ffprobe not installed");
        return;
    }

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.mp4");
    let output = dir.path().join("broken.gif");
    tokio::fs::write(&input, b"definitely not a video").await.unwrap();

    let err = FfmpegGifTranscoder::default()
        .convert(&input, &output, &ConversionParams::default())
        .await
        .unwrap_err();

    match &err {
        MediaError::FfmpegFailed { stderr: Some(stderr), .. } => assert!(!stderr.is_empty()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!output.exists(), "partial output must be removed");
}
