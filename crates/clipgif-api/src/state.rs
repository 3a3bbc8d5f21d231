//! Application state.

use std::sync::Arc;

use clipgif_media::{FfmpegGifTranscoder, Transcoder};
use clipgif_storage::{ArtifactStore, RetentionPolicy, StorageResult, StoreConfig};

use crate::config::ApiConfig;
use crate::session::SessionKeys;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<ArtifactStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub sessions: SessionKeys,
    pub retention: RetentionPolicy,
}

impl AppState {
    /// Create application state from the environment.
    ///
    /// Fails only if the storage directories cannot be created.
    pub async fn new(config: ApiConfig) -> StorageResult<Self> {
        let store = ArtifactStore::open(StoreConfig::from_env()).await?;
        Ok(Self::with_parts(
            config,
            store,
            Arc::new(FfmpegGifTranscoder::from_env()),
            RetentionPolicy::from_env(),
        ))
    }

    /// Assemble state from already built parts.
    pub fn with_parts(
        config: ApiConfig,
        store: ArtifactStore,
        transcoder: Arc<dyn Transcoder>,
        retention: RetentionPolicy,
    ) -> Self {
        let sessions = match &config.session_secret {
            Some(secret) => SessionKeys::new(secret.as_bytes().to_vec()),
            None => SessionKeys::random(),
        };

        Self {
            config,
            store: Arc::new(store),
            transcoder,
            sessions,
            retention,
        }
    }
}
