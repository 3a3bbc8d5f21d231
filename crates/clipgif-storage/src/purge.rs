//! Deletion outcomes for job purges.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// What happened to one path during a purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The entry existed and was removed.
    Removed,
    /// Nothing was there; already purged or swept.
    Missing,
    /// Removal was attempted and failed, or refused.
    Failed(String),
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed => write!(f, "removed"),
            Self::Missing => write!(f, "missing"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-path results of purging one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub entries: Vec<(PathBuf, DeleteOutcome)>,
}

impl PurgeReport {
    pub fn record(&mut self, path: impl Into<PathBuf>, outcome: DeleteOutcome) {
        self.entries.push((path.into(), outcome));
    }

    /// Append another report's entries.
    pub fn merge(&mut self, other: PurgeReport) {
        self.entries.extend(other.entries);
    }

    pub fn removed(&self) -> usize {
        self.count(|o| matches!(o, DeleteOutcome::Removed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DeleteOutcome::Failed(_)))
    }

    /// No deletion failed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Outcome recorded for `path`, if any.
    pub fn outcome(&self, path: &Path) -> Option<&DeleteOutcome> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&DeleteOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Remove a single directory entry without following links.
///
/// Symlinks are unlinked, never their targets. Directories are refused.
pub async fn remove_entry(path: &Path) -> DeleteOutcome {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return DeleteOutcome::Missing,
        Err(e) => {
            warn!(path = %path.display(), "Failed to stat file for deletion: {}", e);
            return DeleteOutcome::Failed(e.to_string());
        }
    };

    if meta.is_dir() {
        warn!(path = %path.display(), "Refusing to delete directory");
        return DeleteOutcome::Failed("is a directory".to_string());
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Deleted file");
            DeleteOutcome::Removed
        }
        // Raced with a sweep or a concurrent purge.
        Err(e) if e.kind() == ErrorKind::NotFound => DeleteOutcome::Missing,
        Err(e) => {
            warn!(path = %path.display(), "Failed to delete file: {}", e);
            DeleteOutcome::Failed(e.to_string())
        }
    }
}
