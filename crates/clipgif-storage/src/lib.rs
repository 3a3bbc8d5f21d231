//! Local file storage for job artifacts.
//!
//! This crate provides:
//! - The three-directory artifact store (raw uploads, GIFs, previews)
//! - Streaming uploads that only become visible once complete
//! - Per-job purge with independent, idempotent deletions
//! - Age-based retention sweeps

pub mod error;
pub mod purge;
pub mod store;
pub mod sweeper;
pub mod upload;

pub use error::{StorageError, StorageResult};
pub use purge::{DeleteOutcome, PurgeReport};
pub use store::{ArtifactStore, StoreConfig};
pub use sweeper::{sweep, sweep_store, RetentionPolicy, SweepReport};
pub use upload::PendingUpload;
