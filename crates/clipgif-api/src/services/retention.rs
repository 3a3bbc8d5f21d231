//! Background service for reclaiming expired job files.
//!
//! Jobs whose download never happens (tab closed, conversion abandoned,
//! server restarted) leave files behind. This service sweeps the three
//! storage directories on a fixed interval with the aggressive threshold.
//! The first sweep runs immediately, which also reclaims whatever a previous
//! process left on disk.

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use clipgif_storage::{sweep_store, ArtifactStore, RetentionPolicy, SweepReport};

use crate::metrics;

/// Periodic retention sweeper.
pub struct RetentionSweeper {
    store: Arc<ArtifactStore>,
    policy: RetentionPolicy,
    enabled: bool,
}

impl RetentionSweeper {
    /// Create a new sweeper.
    pub fn new(store: Arc<ArtifactStore>, policy: RetentionPolicy) -> Self {
        let enabled = std::env::var("ENABLE_RETENTION_SWEEP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self { store, policy, enabled }
    }

    /// Start the background sweep loop.
    ///
    /// This function runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Retention sweep is disabled");
            return;
        }

        info!(
            interval_secs = self.policy.interval.as_secs(),
            max_age_secs = self.policy.aggressive_max_age.as_secs(),
            "Starting retention sweeper"
        );

        let mut ticker = interval(self.policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Run a single aggressive sweep.
    pub async fn sweep_once(&self) -> SweepReport {
        let report = sweep_store(&self.store, self.policy.aggressive_max_age).await;
        metrics::record_sweep("aggressive", &report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipgif_storage::StoreConfig;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_once_uses_aggressive_threshold() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::open(StoreConfig::under(dir.path())).await.unwrap());

        let stale = store.output_dir().join("1_old.gif");
        std::fs::write(&stale, b"GIF89a").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(2 * 3600))
            .unwrap();
        let fresh = store.output_dir().join("2_new.gif");
        std::fs::write(&fresh, b"GIF89a").unwrap();

        let sweeper = RetentionSweeper::new(Arc::clone(&store), RetentionPolicy::default());
        let report = sweeper.sweep_once().await;

        assert_eq!(report.removed, 1);
        assert!(!stale.exists());
        assert!(fresh.exists());
    }
}
