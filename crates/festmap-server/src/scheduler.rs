//! Background job scheduler.
//!
//! Two recurring jobs run alongside the HTTP server: a local cache refresh on
//! the configured cron expression, and a daily backup prune.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::AppState;

/// Daily at 03:30 UTC.
const PRUNE_CRON: &str = "0 30 3 * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression does not parse, or the scheduler fails to start.
pub async fn build_scheduler(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_cache_sync_job(&scheduler, state.clone()).await?;
    register_prune_job(&scheduler, state).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_cache_sync_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let cron = state.config.sync_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            run_cache_sync(&state).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: cache sync registered");
    Ok(())
}

async fn register_prune_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(PRUNE_CRON, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            match state.coordinator.prune_backups().await {
                Ok(removed) => tracing::info!(removed, "scheduler: backup prune complete"),
                Err(e) => tracing::error!(error = %e, "scheduler: backup prune failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Refreshes the local cache from the canonical store. Returns whether the
/// cache file was rewritten.
pub(crate) async fn run_cache_sync(state: &AppState) -> bool {
    let cache_path = &state.config.cache_path;
    let cached = match festmap_sync::read_cache(cache_path).await {
        Ok(cached) => cached,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: cache read failed");
            return false;
        }
    };

    let outcome = match state.coordinator.sync_local(cached.as_ref()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: cache sync failed");
            return false;
        }
    };

    if !outcome.updated {
        tracing::debug!("scheduler: cache already current");
        return false;
    }

    match festmap_sync::write_cache(cache_path, &outcome.document).await {
        Ok(()) => {
            tracing::info!(
                path = %cache_path.display(),
                total = outcome.document.total_locations(),
                "scheduler: cache refreshed"
            );
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: cache write failed");
            false
        }
    }
}
