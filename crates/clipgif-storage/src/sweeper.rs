//! Age-based reclamation of job files.
//!
//! Nothing tracks which files are still in use. A file is considered live
//! until it is older than the sweep threshold, so thresholds must stay well
//! above the time a job can take from upload to finished download. A client
//! downloading slower than the aggressive threshold can lose its file
//! mid-transfer; that trade-off is accepted in exchange for not locking.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::store::ArtifactStore;

/// Default threshold of the eager sweep run before each upload.
pub const DEFAULT_FULL_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Default threshold of the background sweep.
pub const DEFAULT_AGGRESSIVE_MAX_AGE: Duration = Duration::from_secs(3600);

/// Default period of the background sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Sweep thresholds and cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Threshold for the sweep before every upload.
    pub full_max_age: Duration,
    /// Threshold for the periodic background sweep.
    pub aggressive_max_age: Duration,
    /// How often the background sweep runs.
    pub interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            full_max_age: DEFAULT_FULL_MAX_AGE,
            aggressive_max_age: DEFAULT_AGGRESSIVE_MAX_AGE,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RetentionPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            full_max_age: secs("RETENTION_FULL_MAX_AGE_SECS", DEFAULT_FULL_MAX_AGE),
            aggressive_max_age: secs(
                "RETENTION_AGGRESSIVE_MAX_AGE_SECS",
                DEFAULT_AGGRESSIVE_MAX_AGE,
            ),
            interval: secs("RETENTION_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL),
        }
    }
}

/// Result of one or more sweeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files examined.
    pub scanned: usize,
    /// Files deleted for being too old.
    pub removed: usize,
    /// Old files that could not be deleted.
    pub failed: usize,
}

impl SweepReport {
    fn absorb(&mut self, other: SweepReport) {
        self.scanned += other.scanned;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Delete regular files directly under `directory` older than `max_age`.
///
/// Never fails: unreadable directories and undeletable files are logged and
/// skipped. Symlinks and subdirectories are left alone.
pub async fn sweep(directory: &Path, max_age: Duration) -> SweepReport {
    sweep_at(directory, max_age, SystemTime::now()).await
}

async fn sweep_at(directory: &Path, max_age: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    let mut entries = match tokio::fs::read_dir(directory).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(e) => {
            warn!(dir = %directory.display(), "Failed to read directory for sweep: {}", e);
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %directory.display(), "Failed to list directory during sweep: {}", e);
                break;
            }
        };

        let path = entry.path();

        // DirEntry::metadata does not follow symlinks.
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %path.display(), "Skipping entry without metadata: {}", e);
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        report.scanned += 1;

        let Ok(modified) = meta.modified() else {
            continue;
        };
        // A modification time in the future counts as brand new.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), age_secs = age.as_secs(), "Swept expired file");
                report.removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), "Failed to remove expired file: {}", e);
                report.failed += 1;
            }
        }
    }

    report
}

/// Sweep all three managed directories.
pub async fn sweep_store(store: &ArtifactStore, max_age: Duration) -> SweepReport {
    let mut total = SweepReport::default();
    for dir in store.directories() {
        total.absorb(sweep(dir, max_age).await);
    }

    if total.removed > 0 || total.failed > 0 {
        info!(
            removed = total.removed,
            failed = total.failed,
            scanned = total.scanned,
            max_age_secs = max_age.as_secs(),
            "Retention sweep complete"
        );
    }

    total
}
