//! Local copy of the canonical map, refreshed by [`crate::SyncCoordinator::sync_local`].

use std::io::ErrorKind;
use std::path::Path;

use festmap_core::{canonical_json_bytes, parse_map_document, MapDocument};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Reads the cached document.
///
/// A missing file reads as `None`. So does a file that no longer parses as a
/// valid map: the next sync rewrites it.
///
/// # Errors
///
/// [`CacheError::Io`] for any read failure other than a missing file.
pub async fn read_cache(path: &Path) -> Result<Option<MapDocument>, CacheError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };

    match parse_map_document(&bytes) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache: ignoring unreadable cache file");
            Ok(None)
        }
    }
}

/// Replaces the cache file with `document`, via a sibling temp file and a
/// rename so readers never see a partial write.
///
/// # Errors
///
/// [`CacheError::Io`] if the directory or file cannot be written.
pub async fn write_cache(path: &Path, document: &MapDocument) -> Result<(), CacheError> {
    let bytes = canonical_json_bytes(document)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))?;

    tracing::debug!(path = %path.display(), size = bytes.len(), "cache: written");
    Ok(())
}
