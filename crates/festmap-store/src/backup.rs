//! Dated, write-once snapshots of the canonical document.
//!
//! A snapshot is taken of the remote content before every commit. Snapshots
//! are never rewritten; the only other operation is pruning the oldest ones.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::BackupError;

const FILE_PREFIX: &str = "map-data-";
const FILE_SUFFIX: &str = ".json";

/// Label for a snapshot taken at `at`. Lexical order equals chronological
/// order, which is what [`FsBackupStore::list_by_recency`] relies on.
#[must_use]
pub fn backup_label(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub label: String,
    pub path: PathBuf,
}

pub trait BackupStore: Send + Sync {
    /// Stores `bytes` under `label`. Fails if the label was already used.
    fn save(
        &self,
        bytes: &[u8],
        label: &str,
    ) -> impl Future<Output = Result<BackupEntry, BackupError>> + Send;

    /// All snapshots, newest first.
    fn list_by_recency(&self) -> impl Future<Output = Result<Vec<BackupEntry>, BackupError>> + Send;

    /// Deletes every snapshot except the newest `beyond`, returning how many
    /// were removed.
    fn delete_oldest(&self, beyond: usize) -> impl Future<Output = Result<usize, BackupError>> + Send;
}

/// Snapshots as `map-data-<label>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct FsBackupStore {
    dir: PathBuf,
}

impl FsBackupStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, label: &str) -> Result<PathBuf, BackupError> {
        let usable = !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !label.contains("..");
        if !usable {
            return Err(BackupError::InvalidLabel(label.to_string()));
        }
        Ok(self.dir.join(format!("{FILE_PREFIX}{label}{FILE_SUFFIX}")))
    }

    fn io_error(path: &Path, source: std::io::Error) -> BackupError {
        BackupError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl BackupStore for FsBackupStore {
    async fn save(&self, bytes: &[u8], label: &str) -> Result<BackupEntry, BackupError> {
        let path = self.path_for(label)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    BackupError::AlreadyExists {
                        path: path.display().to_string(),
                    }
                } else {
                    Self::io_error(&path, e)
                }
            })?;

        file.write_all(bytes)
            .await
            .map_err(|e| Self::io_error(&path, e))?;
        file.sync_all()
            .await
            .map_err(|e| Self::io_error(&path, e))?;

        tracing::info!(path = %path.display(), size = bytes.len(), "backup: snapshot saved");

        Ok(BackupEntry {
            label: label.to_string(),
            path,
        })
    }

    async fn list_by_recency(&self) -> Result<Vec<BackupEntry>, BackupError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(label) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(FILE_PREFIX))
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            entries.push(BackupEntry {
                label: label.to_string(),
                path: entry.path(),
            });
        }

        entries.sort_by(|a, b| b.label.cmp(&a.label));
        Ok(entries)
    }

    async fn delete_oldest(&self, beyond: usize) -> Result<usize, BackupError> {
        let entries = self.list_by_recency().await?;
        let mut removed = 0;

        for entry in entries.iter().skip(beyond) {
            tokio::fs::remove_file(&entry.path)
                .await
                .map_err(|e| Self::io_error(&entry.path, e))?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!(removed, kept = beyond, "backup: pruned old snapshots");
        }
        Ok(removed)
    }
}
