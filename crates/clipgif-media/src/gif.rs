//! Video to animated GIF conversion.
//!
//! The encoding itself is FFmpeg's job. This module turns validated
//! [`ConversionParams`] into a command line, runs it under a timeout and
//! reports failures with FFmpeg's own diagnostics.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use clipgif_models::ConversionParams;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Default upper bound on a single conversion.
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Something that can turn an uploaded video into a GIF.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into a GIF at `output`.
    ///
    /// On error no usable file is left at `output`.
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        params: &ConversionParams,
    ) -> MediaResult<()>;
}

/// Build the FFmpeg filter graph for a GIF with a generated palette.
pub fn gif_filter(params: &ConversionParams) -> String {
    let mut chain = format!("fps={}", params.fps);
    if let Some(width) = params.width {
        // -1 keeps the source aspect ratio
        chain.push_str(&format!(",scale={}:-1:flags=lanczos", width));
    }
    format!(
        "{},split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
        chain
    )
}

/// Build the FFmpeg command for one conversion.
///
/// Seek and duration are input options, so only the trimmed window is
/// decoded.
pub fn build_gif_command(input: &Path, output: &Path, params: &ConversionParams) -> FfmpegCommand {
    let window = params.trim_window();
    let mut cmd = FfmpegCommand::new(input, output);

    if let Some(seek) = window.seek {
        cmd = cmd.seek(seek);
    }
    if let Some(duration) = window.duration {
        cmd = cmd.duration(duration);
    }

    cmd.video_filter(gif_filter(params))
        .no_audio()
        .output_args(["-loop", "0"])
        .format("gif")
}

/// FFmpeg-backed [`Transcoder`].
#[derive(Debug, Clone)]
pub struct FfmpegGifTranscoder {
    runner: FfmpegRunner,
}

impl Default for FfmpegGifTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSION_TIMEOUT)
    }
}

impl FfmpegGifTranscoder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout),
        }
    }

    /// Create from `CONVERSION_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let timeout = std::env::var("CONVERSION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONVERSION_TIMEOUT);
        Self::new(timeout)
    }
}

#[async_trait]
impl Transcoder for FfmpegGifTranscoder {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        params: &ConversionParams,
    ) -> MediaResult<()> {
        params.validate()?;

        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let cmd = build_gif_command(input, output, params);
        let expected_ms = params
            .trim_window()
            .duration
            .map(|secs| (secs * 1000.0) as i64)
            .unwrap_or(0);

        let started = Instant::now();
        let result = self
            .runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    frame = progress.frame,
                    percent = progress.percentage(expected_ms),
                    "GIF encoding progress"
                );
            })
            .await;

        match result {
            Ok(()) => {
                info!(
                    input = %input.display(),
                    output = %output.display(),
                    fps = params.fps,
                    width = ?params.width,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "GIF conversion complete"
                );
                Ok(())
            }
            Err(e) => {
                // A failed or killed encode may leave a truncated GIF behind.
                if let Err(rm) = tokio::fs::remove_file(output).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            output = %output.display(),
                            "Failed to remove partial output: {}",
                            rm
                        );
                    }
                }
                Err(e)
            }
        }
    }
}
