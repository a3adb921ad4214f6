mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use festmap_store::{FsBackupStore, GithubStore};
use festmap_sync::SyncCoordinator;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(festmap_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = GithubStore::from_app_config(&config)?;
    let backups = FsBackupStore::new(&config.backup_dir);
    let state = AppState {
        coordinator: Arc::new(SyncCoordinator::new(store, backups, config.backup_retain)),
        config: Arc::clone(&config),
    };

    let _scheduler = scheduler::build_scheduler(state.clone()).await?;
    scheduler::run_cache_sync(&state).await;

    let app = build_app(state);

    tracing::info!(
        addr = %config.bind_addr,
        env = %config.env,
        owner = %config.github_owner,
        repo = %config.github_repo,
        branch = %config.github_branch,
        "festmap-server listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
