//! Job definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filename::JobNames;
use crate::params::ConversionParams;

/// Identifier of a job: the shared `{timestamp}_{stem}` filename stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three files belonging to one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFiles {
    /// Original upload.
    pub raw_path: PathBuf,
    /// Generated GIF.
    pub artifact_path: PathBuf,
    /// Copy of the GIF in the public preview directory.
    pub preview_path: PathBuf,
}

impl JobFiles {
    /// Iterate over the paths with a short label for logging.
    pub fn labelled(&self) -> [(&'static str, &PathBuf); 3] {
        [
            ("raw", &self.raw_path),
            ("artifact", &self.artifact_path),
            ("preview", &self.preview_path),
        ]
    }
}

/// A materialized job: converted, published and ready for download.
///
/// This is the record carried in session state. It only exists once all
/// three files are on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    /// Filename of the generated GIF, used in download and preview URLs.
    pub artifact_filename: String,
    /// Original filename as sent by the client. Display only.
    pub display_name: String,
    /// Size of the generated GIF in bytes.
    pub size_bytes: u64,
    pub files: JobFiles,
    pub params: ConversionParams,
}

impl Job {
    /// Assemble a job from its allocated names and stored files.
    pub fn new(
        names: &JobNames,
        display_name: impl Into<String>,
        size_bytes: u64,
        files: JobFiles,
        params: ConversionParams,
    ) -> Self {
        Self {
            job_id: JobId::from_string(&names.job_id),
            artifact_filename: names.artifact_filename.clone(),
            display_name: display_name.into(),
            size_bytes,
            files,
            params,
        }
    }

    /// Artifact size in megabytes, rounded to two decimals.
    pub fn size_mb(&self) -> f64 {
        let mb = self.size_bytes as f64 / (1024.0 * 1024.0);
        (mb * 100.0).round() / 100.0
    }
}
