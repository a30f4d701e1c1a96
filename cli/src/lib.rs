//! Diction coach command-line host.
//!
//! Wires a file-backed [`EntitlementEngine`] and a [`NotificationScheduler`]
//! behind a small set of account and premium commands. Command handling lives
//! here so it can be driven against any store in tests; `main.rs` only sets
//! up logging and storage.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use diction_entitlement::{
    DEFAULT_STORAGE_KEY, DEFAULT_TRIAL_DAYS, EngineConfig, EntitlementEngine, EntitlementError,
    PremiumStatus, UserUpdate,
};
use diction_notify::{NotificationScheduler, NotificationSink, SchedulerConfig};
use diction_storage::FileStore;
use serde_json::json;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "diction")]
#[command(about = "Diction coach account and premium trial manager")]
pub struct Cli {
    /// Directory holding the stored user record
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Key the user record is stored under
    #[arg(long, default_value = DEFAULT_STORAGE_KEY)]
    pub storage_key: String,

    /// Simulated authentication delay in milliseconds
    #[arg(long, default_value_t = 800)]
    pub auth_delay_ms: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the current user and premium status
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an account and sign in
    Register {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    /// Sign in with an existing account
    Login {
        email: String,
        #[arg(long)]
        password: String,
        /// Display name, defaults to the local part of the email
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign out and delete the stored record
    Logout,
    /// Change the email or display name
    Update {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Grant premium for a number of calendar days
    ActivatePremium {
        #[arg(long, default_value_t = DEFAULT_TRIAL_DAYS)]
        days: u32,
    },
    /// Record the one-time product purchase
    ActivateProduct,
    /// Keep running, healing lapsed grants and printing trial reminders
    Watch {
        /// Seconds between remaining-time checks
        #[arg(long, default_value_t = 60)]
        poll_secs: u64,
    },
}

impl Cli {
    /// Engine settings derived from the command line.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            storage_key: self.storage_key.clone(),
            auth_delay_ms: self.auth_delay_ms,
            ..EngineConfig::default()
        }
    }

    /// Directory for the file store, falling back to the platform data dir.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => FileStore::default_dir().context("no platform data directory, pass --data-dir"),
        }
    }
}

/// Runs a one-shot command against `engine`, writing output to `out`.
///
/// `Watch` is long-running and handled by [`watch`]; passing it here is an
/// error.
pub async fn execute<W: Write>(
    engine: &EntitlementEngine,
    command: &Command,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Status { json } => print_status(engine, *json, out).await?,
        Command::Register { email, password, name } => {
            let user = engine.register(email, password, name).await?;
            writeln!(out, "registered {} ({})", user.email(), user.name())?;
        }
        Command::Login { email, password, name } => {
            let user = engine.login(email, password, name.as_deref()).await?;
            writeln!(out, "logged in as {} ({})", user.email(), user.name())?;
        }
        Command::Logout => {
            let was_authenticated = engine.is_authenticated().await;
            engine.logout().await;
            if was_authenticated {
                writeln!(out, "logged out")?;
            } else {
                writeln!(out, "not logged in")?;
            }
        }
        Command::Update { email, name } => {
            let mut update = UserUpdate::new();
            if let Some(email) = email {
                update = update.email(email.trim());
            }
            if let Some(name) = name {
                update = update.name(name.trim());
            }
            if update.is_empty() {
                bail!("nothing to update, pass --email or --name");
            }
            let user = engine
                .update_user(update)
                .await
                .ok_or(EntitlementError::NotAuthenticated)?;
            writeln!(out, "updated {} ({})", user.email(), user.name())?;
        }
        Command::ActivatePremium { days } => {
            let user = engine
                .activate_premium(*days)
                .await
                .ok_or(EntitlementError::NotAuthenticated)?;
            let remaining = engine.remaining_time().await;
            writeln!(
                out,
                "premium active for {}, {} left",
                user.email(),
                format_remaining(remaining)
            )?;
        }
        Command::ActivateProduct => {
            let user = engine
                .activate_product()
                .await
                .ok_or(EntitlementError::NotAuthenticated)?;
            writeln!(out, "product activated for {}", user.email())?;
        }
        Command::Watch { .. } => bail!("watch is not a one-shot command"),
    }
    Ok(())
}

async fn print_status<W: Write>(
    engine: &EntitlementEngine,
    as_json: bool,
    out: &mut W,
) -> Result<()> {
    let user = engine.current_user().await;
    let status = engine.status().await;

    if as_json {
        let doc = json!({ "user": user, "status": status });
        writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        return Ok(());
    }

    let Some(user) = user else {
        writeln!(out, "not logged in")?;
        return Ok(());
    };
    writeln!(out, "user:    {} <{}>", user.name(), user.email())?;
    writeln!(out, "id:      {}", user.id())?;
    let premium = match status {
        PremiumStatus::Free => "free".to_string(),
        PremiumStatus::Active { remaining_secs } => {
            format!("active, {} left", format_remaining(remaining_secs))
        }
        PremiumStatus::Lapsed => "lapsed".to_string(),
    };
    writeln!(out, "premium: {premium}")?;
    writeln!(out, "product: {}", if user.has_product() { "yes" } else { "no" })?;
    Ok(())
}

/// Formats a remaining duration for humans, e.g. `2d 03h 15m` or `1h 05m 09s`.
pub fn format_remaining(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m")
    } else {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    }
}

/// Runs self-heal and the notification scheduler until `shutdown` resolves.
pub async fn watch(
    engine: &EntitlementEngine,
    sink: Arc<dyn NotificationSink>,
    config: SchedulerConfig,
    shutdown: impl Future<Output = ()>,
) {
    let mut events = engine.subscribe();
    engine.start();
    let scheduler = NotificationScheduler::new(engine.clone(), sink, config).spawn();
    info!("watching trial status");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => debug!("entitlement event: {event:?}"),
                Err(RecvError::Lagged(n)) => warn!("missed {n} entitlement events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    scheduler.shutdown().await;
    engine.shutdown().await;
    info!("watch stopped");
}
