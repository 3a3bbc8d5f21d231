//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the expected output duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }
}

/// Feed one stderr line into `current`.
///
/// Returns `None` for lines that are not part of the progress block, which
/// callers treat as diagnostic output. Returns `Some(true)` when the line
/// closes a progress block (`progress=continue|end`).
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<bool> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_ms" | "out_time_us" => {
            // FFmpeg reports both keys in microseconds despite the name.
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(true);
        }
        "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames"
        | "stream_0_0_q" => {}
        _ => return None,
    }

    Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 1000,
            ..Default::default()
        };

        assert!((progress.percentage(2000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(500) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert_eq!(parse_progress_line("out_time_ms=5000000", &mut progress), Some(false));
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("frame=42", &mut progress);
        assert_eq!(progress.frame, 42);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        assert_eq!(parse_progress_line("progress=end", &mut progress), Some(true));
        assert!(progress.is_complete);
    }

    #[test]
    fn test_diagnostic_lines_are_not_progress() {
        let mut progress = FfmpegProgress::default();
        assert_eq!(
            parse_progress_line("in.mp4: Invalid data found when processing input", &mut progress),
            None
        );
        assert_eq!(
            parse_progress_line("[gif @ 0x55] width=0 is invalid", &mut progress),
            None
        );
    }
}
