//! Conversion parameters and trim window derivation.
//!
//! Parameters arrive as untrusted form fields. [`ConversionParams::from_form`]
//! parses them the same way for every upload; [`ConversionParams::validate`]
//! enforces the numeric invariants before anything touches the encoder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame rate used when the form leaves `fps` blank.
pub const DEFAULT_FPS: u32 = 10;

/// Upper bound on the GIF frame rate. GIF frame delays are in centiseconds,
/// so anything above 50 fps is not representable anyway.
pub const MAX_FPS: u32 = 50;

/// Upper bound on the requested output width in pixels.
pub const MAX_WIDTH: u32 = 4096;

/// Errors produced while parsing or validating conversion parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("Invalid frame rate '{0}'. Please use a whole number (e.g., 10)")]
    InvalidFps(String),

    #[error("Frame rate must be between 1 and {MAX_FPS}")]
    FpsOutOfRange,

    #[error("Width must be between 1 and {MAX_WIDTH} pixels")]
    WidthOutOfRange,

    #[error("Invalid time format. Please use seconds (e.g., 10.5)")]
    InvalidTime(String),

    #[error("Start time cannot be negative")]
    NegativeStart,

    #[error("End time must be after start time")]
    EndNotAfterStart,
}

/// User-requested conversion settings for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Output frame rate.
    pub fps: u32,
    /// Target width in pixels; height follows the source aspect ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Trim start in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// Trim end in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            width: None,
            start_time: None,
            end_time: None,
        }
    }
}

/// Seek offset and duration handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrimWindow {
    /// Input seek in seconds, `None` to start at the beginning.
    pub seek: Option<f64>,
    /// Length of the window in seconds, `None` to run to the end of input.
    pub duration: Option<f64>,
}

impl ConversionParams {
    /// Parse raw form fields.
    ///
    /// - `fps`: blank means [`DEFAULT_FPS`]; anything else must be an integer.
    /// - `width`: only a string of digits is honoured; blank or anything else
    ///   means "keep the source width".
    /// - `start_time` / `end_time`: blank means unset; otherwise decimal seconds.
    pub fn from_form(
        fps: Option<&str>,
        width: Option<&str>,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> Result<Self, ParamsError> {
        let fps = match non_blank(fps) {
            None => DEFAULT_FPS,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| ParamsError::InvalidFps(raw.to_string()))?,
        };

        let width = non_blank(width)
            .filter(|raw| raw.chars().all(|c| c.is_ascii_digit()))
            .and_then(|raw| raw.parse::<u32>().ok());

        Ok(Self {
            fps,
            width,
            start_time: parse_seconds(start_time)?,
            end_time: parse_seconds(end_time)?,
        })
    }

    /// Check numeric invariants.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ParamsError::FpsOutOfRange);
        }

        if let Some(width) = self.width {
            if width == 0 || width > MAX_WIDTH {
                return Err(ParamsError::WidthOutOfRange);
            }
        }

        let start = self.start_time.unwrap_or(0.0);
        if start < 0.0 {
            return Err(ParamsError::NegativeStart);
        }

        if let Some(end) = self.end_time {
            if end <= start {
                return Err(ParamsError::EndNotAfterStart);
            }
        }

        Ok(())
    }

    /// Derive the encoder's seek/duration pair.
    ///
    /// The duration is measured from the effective start, so an end time
    /// without a start time trims from zero.
    pub fn trim_window(&self) -> TrimWindow {
        let start = self.start_time.unwrap_or(0.0);
        TrimWindow {
            seek: self.start_time.filter(|s| *s > 0.0),
            duration: self.end_time.map(|end| end - start),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_seconds(value: Option<&str>) -> Result<Option<f64>, ParamsError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };

    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() => Ok(Some(secs)),
        _ => Err(ParamsError::InvalidTime(raw.to_string())),
    }
}
