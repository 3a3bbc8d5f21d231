//! Streaming writes of raw uploads.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// An upload being written to the raw-upload directory.
///
/// Bytes land in a hidden `.part` file next to the final name and only
/// appear under the final name on [`PendingUpload::commit`]. Dropping an
/// uncommitted upload removes the partial file.
#[derive(Debug)]
pub struct PendingUpload {
    file: Option<File>,
    part_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl PendingUpload {
    pub(crate) async fn create(final_path: PathBuf) -> StorageResult<Self> {
        let part_path = part_path_for(&final_path)?;
        let file = File::create(&part_path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", part_path.display(), e)))?;

        debug!(path = %final_path.display(), "Started upload");

        Ok(Self {
            file: Some(file),
            part_path,
            final_path,
            written: 0,
        })
    }

    /// Append a chunk of the request body.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::upload_failed("upload already finished"))?;
        file.write_all(chunk).await.map_err(|e| {
            StorageError::upload_failed(format!("{}: {}", self.part_path.display(), e))
        })?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush to disk and move the file to its final name.
    pub async fn commit(mut self) -> StorageResult<PathBuf> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StorageError::upload_failed("upload already finished"))?;

        file.flush().await.map_err(|e| StorageError::upload_failed(e.to_string()))?;
        file.sync_all().await.map_err(|e| StorageError::upload_failed(e.to_string()))?;
        drop(file);

        tokio::fs::rename(&self.part_path, &self.final_path)
            .await
            .map_err(|e| {
                StorageError::upload_failed(format!("{}: {}", self.final_path.display(), e))
            })?;

        debug!(path = %self.final_path.display(), bytes = self.written, "Committed upload");

        // Nothing left for Drop to clean up.
        self.part_path = PathBuf::new();
        Ok(std::mem::take(&mut self.final_path))
    }

    /// Discard the upload and its partial file.
    pub async fn abort(mut self) {
        self.file.take();
        remove_part(&self.part_path).await;
        self.part_path = PathBuf::new();
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.part_path.as_os_str().is_empty() {
            return;
        }
        self.file.take();
        if let Err(e) = std::fs::remove_file(&self.part_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.part_path.display(), "Failed to remove partial upload: {}", e);
            }
        }
    }
}

fn part_path_for(final_path: &Path) -> StorageResult<PathBuf> {
    let name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidName(final_path.display().to_string()))?;
    Ok(final_path.with_file_name(format!(".{}.part", name)))
}

async fn remove_part(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove partial upload: {}", e);
        }
    }
}
