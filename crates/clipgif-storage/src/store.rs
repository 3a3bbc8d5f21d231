//! Local artifact store.
//!
//! Three flat directories hold everything a job produces:
//! - raw uploads (`UPLOAD_DIR`)
//! - generated GIFs (`OUTPUT_DIR`)
//! - public preview copies (`PREVIEW_DIR`)
//!
//! There is no index. A job's files are found through the session record or,
//! as a fallback, through the shared filename stem.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use clipgif_models::filename::{is_safe_filename, job_stem, ALLOWED_EXTENSIONS};
use clipgif_models::JobFiles;

use crate::error::{StorageError, StorageResult};
use crate::purge::{remove_entry, DeleteOutcome, PurgeReport};
use crate::upload::PendingUpload;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Storage directory configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub preview_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("gifs"),
            preview_dir: PathBuf::from("static").join("gifs"),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            preview_dir: std::env::var("PREVIEW_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.preview_dir),
        }
    }

    /// All three directories rooted under `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            upload_dir: base.join("uploads"),
            output_dir: base.join("gifs"),
            preview_dir: base.join("static").join("gifs"),
        }
    }
}

/// Owner of the three job directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: StoreConfig,
}

impl ArtifactStore {
    /// Open the store, creating any missing directories.
    pub async fn open(config: StoreConfig) -> StorageResult<Self> {
        for dir in [&config.upload_dir, &config.output_dir, &config.preview_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
        }

        info!(
            upload_dir = %config.upload_dir.display(),
            output_dir = %config.output_dir.display(),
            preview_dir = %config.preview_dir.display(),
            "Artifact store ready"
        );

        Ok(Self { config })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn preview_dir(&self) -> &Path {
        &self.config.preview_dir
    }

    /// The managed directories, in sweep order.
    pub fn directories(&self) -> [&Path; 3] {
        [self.upload_dir(), self.output_dir(), self.preview_dir()]
    }

    /// Start streaming a raw upload under its allocated filename.
    pub async fn begin_upload(&self, raw_filename: &str) -> StorageResult<PendingUpload> {
        let path = join_checked(self.upload_dir(), raw_filename)?;
        PendingUpload::create(path).await
    }

    /// Write a whole reader as a raw upload.
    pub async fn save_upload<R>(&self, mut reader: R, raw_filename: &str) -> StorageResult<PathBuf>
    where
        R: AsyncRead + Unpin,
    {
        let mut upload = self.begin_upload(raw_filename).await?;
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| StorageError::upload_failed(e.to_string()))?;
            if n == 0 {
                break;
            }
            upload.write_chunk(&buf[..n]).await?;
        }

        upload.commit().await
    }

    /// Path the artifact for `artifact_filename` is generated at. No I/O.
    pub fn resolve_artifact(&self, artifact_filename: &str) -> StorageResult<PathBuf> {
        join_checked(self.output_dir(), artifact_filename)
    }

    /// Make the artifact reachable from the preview directory.
    ///
    /// The preview is an independent copy. Any entry already at the target
    /// name is removed first so a stale file or link from an earlier job can
    /// never be served in its place.
    pub async fn publish_preview(
        &self,
        artifact_path: &Path,
        artifact_filename: &str,
    ) -> StorageResult<PathBuf> {
        let target = join_checked(self.preview_dir(), artifact_filename)?;

        if let DeleteOutcome::Failed(reason) = remove_entry(&target).await {
            return Err(StorageError::publish_failed(format!(
                "cannot replace {}: {}",
                target.display(),
                reason
            )));
        }

        let part = self.preview_dir().join(format!(".{}.part", artifact_filename));
        if let Err(e) = tokio::fs::copy(artifact_path, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(StorageError::publish_failed(format!(
                "{} -> {}: {}",
                artifact_path.display(),
                part.display(),
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&part, &target).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(StorageError::publish_failed(format!("{}: {}", target.display(), e)));
        }

        debug!(path = %target.display(), "Published preview");
        Ok(target)
    }

    /// Find a generated artifact by filename.
    pub async fn locate_artifact(&self, filename: &str) -> StorageResult<PathBuf> {
        locate(self.output_dir(), filename).await
    }

    /// Find a preview copy by filename.
    pub async fn locate_preview(&self, filename: &str) -> StorageResult<PathBuf> {
        locate(self.preview_dir(), filename).await
    }

    /// Delete a raw upload after a failed conversion.
    pub async fn remove_upload(&self, raw_path: &Path) -> DeleteOutcome {
        self.remove_managed(raw_path, &[self.upload_dir()]).await
    }

    /// Delete every file of a job.
    ///
    /// Each path is attempted independently; a failure on one never stops
    /// the others. Paths outside the managed directories are refused.
    pub async fn purge(&self, files: &JobFiles) -> PurgeReport {
        let mut report = PurgeReport::default();

        for (kind, path) in files.labelled() {
            let outcome = self.remove_managed(path, &self.directories()).await;
            debug!(kind, path = %path.display(), %outcome, "Purge step");
            report.record(path.clone(), outcome);
        }

        report
    }

    /// Best-effort cleanup driven only by an artifact filename.
    ///
    /// Deletes the artifact and its preview by name and any raw upload named
    /// `{timestamp}_{stem}.{ext}` for an accepted container extension. Used
    /// when the session record that names the raw upload has been lost.
    pub async fn purge_by_artifact_name(&self, artifact_filename: &str) -> PurgeReport {
        let mut report = PurgeReport::default();

        if !is_safe_filename(artifact_filename) {
            warn!(filename = artifact_filename, "Refusing fallback purge for unsafe filename");
            return report;
        }

        for dir in [self.output_dir(), self.preview_dir()] {
            let path = dir.join(artifact_filename);
            let outcome = remove_entry(&path).await;
            report.record(path, outcome);
        }

        match self.find_raw_uploads(job_stem(artifact_filename)).await {
            Ok(paths) => {
                for path in paths {
                    let outcome = remove_entry(&path).await;
                    report.record(path, outcome);
                }
            }
            Err(e) => {
                warn!(
                    dir = %self.upload_dir().display(),
                    "Failed to scan uploads for fallback purge: {}",
                    e
                );
            }
        }

        report
    }

    /// Raw uploads named exactly `{stem}.{ext}`.
    ///
    /// Stems may contain dots, so `17_clip.v2.mp4` belongs to job
    /// `17_clip.v2`, not `17_clip`.
    async fn find_raw_uploads(&self, stem: &str) -> std::io::Result<Vec<PathBuf>> {
        let mut matches = Vec::new();
        let mut entries = tokio::fs::read_dir(self.upload_dir()).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if is_raw_upload_of(name, stem) && entry.file_type().await?.is_file() {
                matches.push(entry.path());
            }
        }

        Ok(matches)
    }

    async fn remove_managed(&self, path: &Path, allowed: &[&Path]) -> DeleteOutcome {
        let managed = path
            .parent()
            .map(|parent| allowed.iter().any(|dir| parent == *dir))
            .unwrap_or(false);

        if !managed {
            warn!(path = %path.display(), "Refusing to delete file outside managed directories");
            return DeleteOutcome::Failed("outside managed directories".to_string());
        }

        remove_entry(path).await
    }
}

fn is_raw_upload_of(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext))
}

fn join_checked(dir: &Path, filename: &str) -> StorageResult<PathBuf> {
    if !is_safe_filename(filename) {
        return Err(StorageError::InvalidName(filename.to_string()));
    }
    Ok(dir.join(filename))
}

async fn locate(dir: &Path, filename: &str) -> StorageResult<PathBuf> {
    let path = join_checked(dir, filename).map_err(|_| StorageError::not_found(filename))?;
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(StorageError::not_found(filename)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::not_found(filename))
        }
        Err(e) => Err(StorageError::Io(e)),
    }
}
