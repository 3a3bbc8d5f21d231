//! FFmpeg CLI wrapper for GIF conversion.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`, with everything else on
//!   stderr kept as diagnostics
//! - The [`Transcoder`] seam used by the API, with an FFmpeg implementation
//! - FFprobe media inspection

pub mod command;
pub mod error;
pub mod gif;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use gif::{
    build_gif_command, gif_filter, FfmpegGifTranscoder, Transcoder, DEFAULT_CONVERSION_TIMEOUT,
};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
