//! Diction coach CLI
//!
//! Manages the local diction coach account and its premium trial from the
//! command line. The user record is stored as JSON under the data directory.
//!
//! Usage:
//!   diction register ann@example.com --password secret --name Ann
//!   diction activate-premium --days 3
//!   diction watch

use anyhow::{Context, Result};
use clap::Parser;
use diction_cli::{Cli, Command, execute, watch};
use diction_entitlement::EntitlementEngine;
use diction_notify::{NotificationSink, SchedulerConfig, TrialNotification};
use diction_storage::FileStore;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let data_dir = cli.resolve_data_dir()?;
    let store = FileStore::open(&data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;
    info!("using data directory {}", store.root().display());

    let engine = EntitlementEngine::new(Arc::new(store), cli.engine_config());
    engine.load().await;

    match &cli.command {
        Command::Watch { poll_secs } => {
            let sink: Arc<dyn NotificationSink> = Arc::new(|n: &TrialNotification| {
                println!("[{}] {}: {}", n.threshold, n.title, n.message);
            });
            let config = SchedulerConfig { poll_interval_secs: *poll_secs };
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("failed to listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            watch(&engine, sink, config, shutdown).await;
        }
        command => {
            let mut stdout = std::io::stdout().lock();
            execute(&engine, command, &mut stdout).await?;
        }
    }

    Ok(())
}
