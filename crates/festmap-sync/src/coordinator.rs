//! Orchestration of the canonical map lifecycle.
//!
//! A submission is validated in full before the store is touched, then the
//! current remote content is fetched, snapshotted to the backup store, merged
//! and committed back with the version token from the fetch. Only the store's
//! token check guards against two submissions racing on the same snapshot;
//! the loser gets [`SyncError::PersistFailed`] with a conflict and is not
//! retried here.

use chrono::Utc;
use festmap_core::{
    canonical_json_bytes, content_fingerprint, decode_map_document, merge, parse_map_document,
    MapDocument, MergeResult, MergeStats,
};
use festmap_store::{backup_label, BackupError, BackupStore, RemoteStore, VersionToken};
use serde_json::Value;

use crate::error::{FetchError, SyncError};

/// The canonical document as fetched, with the raw bytes it was decoded
/// from and the version token needed to write it back.
#[derive(Debug, Clone)]
pub struct CanonicalSnapshot {
    pub document: MapDocument,
    pub bytes: Vec<u8>,
    pub version: VersionToken,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub stats: MergeStats,
    pub total_locations: usize,
    /// Version token of the commit that now holds the merged document.
    pub version: VersionToken,
    pub document: MapDocument,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub updated: bool,
    /// Hex SHA-256 of the canonical serialization of `document`.
    pub fingerprint: String,
    pub document: MapDocument,
}

/// Commit message recorded with every merged write.
#[must_use]
pub fn commit_message(stats: &MergeStats) -> String {
    format!(
        "Update map data: {} new, {} updated locations",
        stats.new_locations, stats.updated_locations
    )
}

pub struct SyncCoordinator<R, B> {
    remote: R,
    backups: B,
    backup_retain: usize,
}

impl<R: RemoteStore, B: BackupStore> SyncCoordinator<R, B> {
    #[must_use]
    pub fn new(remote: R, backups: B, backup_retain: usize) -> Self {
        Self {
            remote,
            backups,
            backup_retain,
        }
    }

    #[must_use]
    pub fn backups(&self) -> &B {
        &self.backups
    }

    /// Reads and validates the canonical document.
    ///
    /// # Errors
    ///
    /// [`FetchError::FetchFailed`] when the store cannot be read, otherwise
    /// the specific reason the stored content is unusable.
    pub async fn fetch_canonical(&self) -> Result<CanonicalSnapshot, FetchError> {
        let snapshot = self.remote.read().await.map_err(FetchError::FetchFailed)?;
        let document = parse_map_document(&snapshot.bytes)?;

        tracing::debug!(
            version = %snapshot.version,
            total = document.total_locations(),
            "sync: fetched canonical map"
        );

        Ok(CanonicalSnapshot {
            document,
            bytes: snapshot.bytes,
            version: snapshot.version,
        })
    }

    /// Parses raw submission bytes and submits them.
    ///
    /// # Errors
    ///
    /// [`SyncError::MalformedInput`] if `raw` is not JSON, otherwise as
    /// [`SyncCoordinator::submit`].
    pub async fn submit_bytes(&self, raw: &[u8]) -> Result<SubmitOutcome, SyncError> {
        let incoming: Value = serde_json::from_slice(raw).map_err(SyncError::MalformedInput)?;
        self.submit(incoming).await
    }

    /// Validates `incoming`, merges it into the canonical document and
    /// commits the result.
    ///
    /// The pre-merge remote content is backed up first; a failed backup is
    /// logged and does not block the submission.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidStructure`] / [`SyncError::UndecodableInput`]
    ///   before anything else happens.
    /// - [`SyncError::MergeAborted`] carrying the specific fetch failure.
    /// - [`SyncError::PersistFailed`] if the store rejects the write, e.g. a
    ///   stale version token.
    pub async fn submit(&self, incoming: Value) -> Result<SubmitOutcome, SyncError> {
        let incoming = decode_map_document(incoming)?;
        let canonical = self
            .fetch_canonical()
            .await
            .map_err(SyncError::MergeAborted)?;

        self.snapshot_before_write(&canonical.bytes).await;

        let MergeResult { document, stats } = merge(&canonical.document, &incoming);
        let bytes = canonical_json_bytes(&document).map_err(SyncError::Serialize)?;

        let version = self
            .remote
            .write(&bytes, &canonical.version, &commit_message(&stats))
            .await
            .map_err(SyncError::PersistFailed)?;

        tracing::info!(
            new = stats.new_locations,
            updated = stats.updated_locations,
            total = document.metadata.total_locations,
            version = %version,
            "sync: merged submission committed"
        );

        Ok(SubmitOutcome {
            stats,
            total_locations: document.metadata.total_locations,
            version,
            document,
        })
    }

    /// Runs everything [`SyncCoordinator::submit`] does except the backup and
    /// the write.
    ///
    /// # Errors
    ///
    /// As [`SyncCoordinator::submit`], minus [`SyncError::PersistFailed`].
    pub async fn preview(&self, incoming: Value) -> Result<MergeResult, SyncError> {
        let incoming = decode_map_document(incoming)?;
        let canonical = self
            .fetch_canonical()
            .await
            .map_err(SyncError::MergeAborted)?;
        Ok(merge(&canonical.document, &incoming))
    }

    /// Fetches the canonical document and reports whether it differs from
    /// `cached`. Both sides are compared in canonical serialization, so key
    /// order and formatting do not count as changes.
    ///
    /// # Errors
    ///
    /// [`SyncError::UpstreamFetchFailed`] if the canonical document cannot
    /// be fetched or is unusable.
    pub async fn sync_local(&self, cached: Option<&MapDocument>) -> Result<SyncOutcome, SyncError> {
        let canonical = self
            .fetch_canonical()
            .await
            .map_err(SyncError::UpstreamFetchFailed)?;

        let fingerprint = content_fingerprint(
            &canonical_json_bytes(&canonical.document).map_err(SyncError::Serialize)?,
        );
        let updated = match cached {
            None => true,
            Some(cached) => {
                let cached_bytes = canonical_json_bytes(cached).map_err(SyncError::Serialize)?;
                content_fingerprint(&cached_bytes) != fingerprint
            }
        };

        tracing::info!(
            updated,
            version = %canonical.version,
            fingerprint = %fingerprint,
            "sync: local cache checked"
        );

        Ok(SyncOutcome {
            updated,
            fingerprint,
            document: canonical.document,
        })
    }

    /// Deletes all but the newest `backup_retain` snapshots.
    ///
    /// # Errors
    ///
    /// Returns the [`BackupError`] from the backup store.
    pub async fn prune_backups(&self) -> Result<usize, BackupError> {
        self.backups.delete_oldest(self.backup_retain).await
    }

    async fn snapshot_before_write(&self, bytes: &[u8]) {
        let label = backup_label(Utc::now());
        if let Err(e) = self.backups.save(bytes, &label).await {
            tracing::warn!(error = %e, label = %label, "sync: backup failed; continuing without snapshot");
            return;
        }
        if let Err(e) = self.prune_backups().await {
            tracing::warn!(error = %e, "sync: backup pruning failed");
        }
    }
}

/// Validates raw bytes as a submission without contacting any store.
///
/// # Errors
///
/// [`SyncError::MalformedInput`], [`SyncError::InvalidStructure`] or
/// [`SyncError::UndecodableInput`].
pub fn validate_submission(raw: &[u8]) -> Result<MapDocument, SyncError> {
    parse_map_document(raw).map_err(SyncError::from)
}
