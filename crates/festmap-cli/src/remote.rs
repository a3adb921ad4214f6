//! Commands that talk to the canonical store or the backup directory.

use std::path::Path;

use anyhow::Context;
use festmap_core::AppConfig;
use festmap_store::{BackupStore, FsBackupStore, GithubStore};
use festmap_sync::{read_cache, write_cache, SyncCoordinator};

type Coordinator = SyncCoordinator<GithubStore, FsBackupStore>;

fn build_coordinator(config: &AppConfig) -> anyhow::Result<Coordinator> {
    let store = GithubStore::from_app_config(config)?;
    let backups = FsBackupStore::new(&config.backup_dir);
    Ok(SyncCoordinator::new(store, backups, config.backup_retain))
}

/// Submits `file` to the canonical map. With `dry_run`, the merge is
/// computed against the live document and reported but nothing is written.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or any store
/// operation fails.
pub(crate) async fn run_submit(config: &AppConfig, file: &Path, dry_run: bool) -> anyhow::Result<()> {
    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let coordinator = build_coordinator(config)?;

    if dry_run {
        let incoming: serde_json::Value = serde_json::from_slice(&raw)
            .with_context(|| format!("{} is not valid JSON", file.display()))?;
        let preview = coordinator.preview(incoming).await?;
        println!(
            "dry run: {} new, {} updated, {} total after merge (nothing written)",
            preview.stats.new_locations,
            preview.stats.updated_locations,
            preview.document.metadata.total_locations
        );
        return Ok(());
    }

    let outcome = coordinator.submit_bytes(&raw).await?;
    println!(
        "committed {}: {} new, {} updated, {} total",
        outcome.version,
        outcome.stats.new_locations,
        outcome.stats.updated_locations,
        outcome.total_locations
    );
    Ok(())
}

/// Brings the cache file at `cache` up to date with the canonical map.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the cache cannot be
/// written.
pub(crate) async fn run_sync(config: &AppConfig, cache: &Path) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config)?;
    let cached = read_cache(cache).await?;
    let outcome = coordinator.sync_local(cached.as_ref()).await?;

    if outcome.updated {
        write_cache(cache, &outcome.document).await?;
        println!(
            "cache updated: {} ({} locations)",
            cache.display(),
            outcome.document.total_locations()
        );
    } else {
        println!("cache already current: {}", cache.display());
    }
    Ok(())
}

/// Lists backup snapshots, newest first.
///
/// # Errors
///
/// Returns an error if the backup directory cannot be read.
pub(crate) async fn run_backups_list(config: &AppConfig) -> anyhow::Result<()> {
    let entries = FsBackupStore::new(&config.backup_dir)
        .list_by_recency()
        .await?;

    if entries.is_empty() {
        println!("no backups in {}", config.backup_dir.display());
        return Ok(());
    }

    println!("{:<24}PATH", "LABEL");
    for entry in &entries {
        println!("{:<24}{}", entry.label, entry.path.display());
    }
    Ok(())
}

/// Deletes all but the newest `keep` snapshots.
///
/// # Errors
///
/// Returns an error if `keep` is zero or a snapshot cannot be removed.
pub(crate) async fn run_backups_prune(config: &AppConfig, keep: usize) -> anyhow::Result<()> {
    prune(&FsBackupStore::new(&config.backup_dir), keep).await
}

async fn prune(store: &FsBackupStore, keep: usize) -> anyhow::Result<()> {
    if keep == 0 {
        anyhow::bail!("--keep must be at least 1; the newest snapshot is never pruned");
    }
    let removed = store.delete_oldest(keep).await?;
    println!("removed {removed} backup(s), kept up to {keep}");
    Ok(())
}
