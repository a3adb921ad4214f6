mod map;
mod remote;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "festmap")]
#[command(about = "Festival map data command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a map file's structure without contacting the store
    Validate { file: PathBuf },
    /// Merge two local map files and print the result
    Merge {
        canonical: PathBuf,
        incoming: PathBuf,
        /// Write the merged document here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge a map file into the canonical map and commit it
    Submit {
        file: PathBuf,
        /// Fetch and merge, but do not back up or commit
        #[arg(long)]
        dry_run: bool,
    },
    /// Refresh the local cache from the canonical map
    Sync {
        /// Cache file; defaults to `FESTMAP_CACHE_PATH`
        #[arg(long)]
        cache: Option<PathBuf>,
    },
    /// Inspect or prune local backup snapshots
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Debug, Subcommand)]
enum BackupCommands {
    /// List snapshots, newest first
    List,
    /// Delete all but the newest snapshots
    Prune {
        /// Snapshots to keep; defaults to `FESTMAP_BACKUP_RETAIN`
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Validate { file }) => map::run_validate(&file).await,
        Some(Commands::Merge {
            canonical,
            incoming,
            output,
        }) => map::run_merge(&canonical, &incoming, output.as_deref())
            .await
            .map(|_| ()),
        Some(Commands::Submit { file, dry_run }) => {
            let config = festmap_core::load_app_config()?;
            remote::run_submit(&config, &file, dry_run).await
        }
        Some(Commands::Sync { cache }) => {
            let config = festmap_core::load_app_config()?;
            let cache = cache.unwrap_or_else(|| config.cache_path.clone());
            remote::run_sync(&config, &cache).await
        }
        Some(Commands::Backups { command }) => {
            let config = festmap_core::load_app_config()?;
            match command {
                BackupCommands::List => remote::run_backups_list(&config).await,
                BackupCommands::Prune { keep } => {
                    remote::run_backups_prune(&config, keep.unwrap_or(config.backup_retain)).await
                }
            }
        }
        None => {
            println!("no command given; run `festmap --help` for usage");
            Ok(())
        }
    }
}
