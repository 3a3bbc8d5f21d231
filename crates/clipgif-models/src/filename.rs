//! Filename allocation for uploaded videos.
//!
//! Every upload gets a job stem of the form `{unix_seconds}_{sanitized_stem}`.
//! The raw upload keeps its (lowercased) container extension and the
//! generated artifact uses [`ARTIFACT_EXTENSION`].
//!
//! Two uploads that complete within the same second with the same sanitized
//! name receive the same stem; the later one overwrites the earlier one's
//! files. This collision is an accepted risk and is not masked here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "webm", "mp4", "avi", "mov", "mkv", "flv", "wmv", "mpeg",
];

/// Extension of every generated artifact.
pub const ARTIFACT_EXTENSION: &str = "gif";

/// Stem used when sanitization leaves nothing behind.
const FALLBACK_STEM: &str = "video";

/// Longest sanitized stem kept, in bytes.
const MAX_STEM_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameError {
    #[error("No selected file")]
    Empty,

    #[error("Invalid file type. Allowed types: {}", ALLOWED_EXTENSIONS.join(", "))]
    DisallowedExtension,
}

/// Names allocated for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNames {
    /// Shared stem, `{timestamp}_{sanitized}`.
    pub job_id: String,
    /// Filename of the raw upload.
    pub raw_filename: String,
    /// Filename of the generated GIF.
    pub artifact_filename: String,
}

/// Check the extension of an untrusted filename against the allow-list.
pub fn allowed_extension(original: &str) -> Option<String> {
    let (_, ext) = original.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Allocate job names for an upload received at `now`.
pub fn allocate(original: &str, now: DateTime<Utc>) -> Result<JobNames, FilenameError> {
    if original.trim().is_empty() {
        return Err(FilenameError::Empty);
    }

    let ext = allowed_extension(original).ok_or(FilenameError::DisallowedExtension)?;

    // Only the last path component counts; browsers on some platforms send full paths.
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);

    let job_id = format!("{}_{}", now.timestamp(), sanitize_stem(stem));

    Ok(JobNames {
        raw_filename: format!("{}.{}", job_id, ext),
        artifact_filename: format!("{}.{}", job_id, ARTIFACT_EXTENSION),
        job_id,
    })
}

/// Reduce an arbitrary name to `[A-Za-z0-9._-]`.
///
/// Whitespace becomes `_` and everything else outside the safe set is dropped.
/// Runs of `_` or `.` collapse to one and leading/trailing `.`/`_` are
/// stripped, so the result always passes [`is_safe_filename`].
pub fn sanitize_stem(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for c in raw.chars() {
        let mapped = match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '.' => Some(c),
            c if c == '_' || c.is_whitespace() || c == '/' || c == '\\' => Some('_'),
            _ => None,
        };
        if let Some(c) = mapped {
            if (c == '_' || c == '.') && out.ends_with(c) {
                continue;
            }
            out.push(c);
        }
    }

    let mut trimmed = out.trim_matches(|c| c == '.' || c == '_').to_string();
    if trimmed.len() > MAX_STEM_LEN {
        trimmed.truncate(MAX_STEM_LEN);
        trimmed = trimmed.trim_end_matches(|c| c == '.' || c == '_').to_string();
    }

    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed
    }
}

/// Whether a filename taken from a URL is safe to join onto a storage directory.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

/// Filename without its final extension.
pub fn job_stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

/// Leading integer timestamp of an allocated filename.
pub fn timestamp_prefix(filename: &str) -> Option<i64> {
    let (prefix, _) = filename.split_once('_')?;
    prefix.parse().ok()
}
