use chrono::{TimeDelta, TimeZone, Utc};
use clap::Parser;
use diction_cli::{Cli, Command, execute, format_remaining, watch};
use diction_entitlement::{DEFAULT_STORAGE_KEY, DEFAULT_TRIAL_DAYS, EngineConfig, EntitlementEngine};
use diction_notify::{NotificationSink, SchedulerConfig, Threshold, TrialNotification};
use diction_storage::{FileStore, MemoryStore};
use diction_types::ManualClock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn make_engine() -> (EntitlementEngine, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap());
    let config = EngineConfig {
        auth_delay_ms: 0,
        ..EngineConfig::default()
    };
    let engine = EntitlementEngine::with_clock(
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
        config,
    );
    (engine, clock)
}

async fn run(engine: &EntitlementEngine, args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("diction").chain(args.iter().copied()))?;
    let mut out = Vec::new();
    execute(engine, &cli.command, &mut out).await?;
    Ok(String::from_utf8(out)?)
}

// ── Argument parsing ─────────────────────────────────────────────

#[test]
fn parses_global_flags_and_defaults() {
    let cli = Cli::try_parse_from(["diction", "status"]).unwrap();
    assert_eq!(cli.storage_key, DEFAULT_STORAGE_KEY);
    assert_eq!(cli.auth_delay_ms, 800);
    assert!(!cli.verbose);
    assert!(cli.data_dir.is_none());
    assert_eq!(cli.command, Command::Status { json: false });

    let cli = Cli::try_parse_from([
        "diction",
        "--data-dir",
        "/tmp/diction",
        "--storage-key",
        "alt_user",
        "--auth-delay-ms",
        "0",
        "-v",
        "activate-premium",
    ])
    .unwrap();
    assert_eq!(cli.resolve_data_dir().unwrap(), std::path::PathBuf::from("/tmp/diction"));
    assert!(cli.verbose);
    assert_eq!(cli.command, Command::ActivatePremium { days: DEFAULT_TRIAL_DAYS });

    let config = cli.engine_config();
    assert_eq!(config.storage_key, "alt_user");
    assert_eq!(config.auth_delay_ms, 0);
    assert_eq!(config.self_heal_interval_secs, EngineConfig::default().self_heal_interval_secs);
}

#[test]
fn parses_account_commands() {
    let cli = Cli::try_parse_from(["diction", "login", "a@b.com", "--password", "pw"]).unwrap();
    assert_eq!(
        cli.command,
        Command::Login {
            email: "a@b.com".into(),
            password: "pw".into(),
            name: None,
        }
    );

    let cli = Cli::try_parse_from(["diction", "watch", "--poll-secs", "5"]).unwrap();
    assert_eq!(cli.command, Command::Watch { poll_secs: 5 });
}

#[test]
fn register_requires_password_and_name() {
    assert!(Cli::try_parse_from(["diction", "register", "a@b.com", "--name", "Ann"]).is_err());
    assert!(Cli::try_parse_from(["diction", "register", "a@b.com", "--password", "pw"]).is_err());
    assert!(Cli::try_parse_from(["diction"]).is_err());
}

// ── Formatting ───────────────────────────────────────────────────

#[test]
fn remaining_time_formatting() {
    assert_eq!(format_remaining(0), "0h 00m 00s");
    assert_eq!(format_remaining(3909), "1h 05m 09s");
    assert_eq!(format_remaining(86_400 * 2 + 3 * 3600 + 15 * 60), "2d 03h 15m");
}

// ── Commands ─────────────────────────────────────────────────────

#[tokio::test]
async fn status_without_user() {
    let (engine, _) = make_engine();
    assert_eq!(run(&engine, &["status"]).await.unwrap(), "not logged in\n");
}

#[tokio::test]
async fn register_then_activate_premium() {
    let (engine, _) = make_engine();
    let out = run(&engine, &["register", "ann@example.com", "--password", "pw", "--name", "Ann"])
        .await
        .unwrap();
    assert_eq!(out, "registered ann@example.com (Ann)\n");

    let out = run(&engine, &["activate-premium", "--days", "1"]).await.unwrap();
    assert_eq!(out, "premium active for ann@example.com, 1d 00h 00m left\n");

    let status = run(&engine, &["status"]).await.unwrap();
    assert!(status.contains("user:    Ann <ann@example.com>"));
    assert!(status.contains("premium: active, 1d 00h 00m left"));
    assert!(status.contains("product: no"));
}

#[tokio::test]
async fn status_json_reports_user_and_state() {
    let (engine, clock) = make_engine();
    run(&engine, &["login", "bob@example.com", "--password", "pw"]).await.unwrap();
    run(&engine, &["activate-premium", "--days", "1"]).await.unwrap();
    clock.advance(TimeDelta::hours(23));

    let out = run(&engine, &["status", "--json"]).await.unwrap();
    let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(doc["user"]["name"], "bob");
    assert_eq!(doc["user"]["isPremium"], true);
    assert_eq!(doc["status"]["state"], "active");
    assert_eq!(doc["status"]["remaining_secs"], 3600);
}

#[tokio::test]
async fn mutations_require_login() {
    let (engine, _) = make_engine();
    for args in [
        &["activate-premium"][..],
        &["activate-product"][..],
        &["update", "--name", "Zed"][..],
    ] {
        let err = run(&engine, args).await.unwrap_err();
        assert!(err.to_string().contains("no user is logged in"), "{args:?}: {err}");
    }
    assert!(!engine.is_authenticated().await);
}

#[tokio::test]
async fn update_and_product() {
    let (engine, _) = make_engine();
    run(&engine, &["login", "a@b.com", "--password", "pw", "--name", "Ann"])
        .await
        .unwrap();

    let err = run(&engine, &["update"]).await.unwrap_err();
    assert!(err.to_string().contains("nothing to update"));

    let out = run(&engine, &["update", "--email", " new@b.com ", "--name", "Anna"])
        .await
        .unwrap();
    assert_eq!(out, "updated new@b.com (Anna)\n");

    run(&engine, &["activate-product"]).await.unwrap();
    assert!(engine.current_user().await.unwrap().has_product());
    let status = run(&engine, &["status"]).await.unwrap();
    assert!(status.contains("premium: free"));
    assert!(status.contains("product: yes"));
}

#[tokio::test]
async fn invalid_credentials_are_reported() {
    let (engine, _) = make_engine();
    let err = run(&engine, &["login", "not-an-email", "--password", "pw"]).await.unwrap_err();
    assert!(err.to_string().contains("invalid credentials"), "{err}");
    assert!(!engine.is_authenticated().await);
}

#[tokio::test]
async fn logout_reports_previous_state() {
    let (engine, _) = make_engine();
    assert_eq!(run(&engine, &["logout"]).await.unwrap(), "not logged in\n");
    run(&engine, &["login", "a@b.com", "--password", "pw"]).await.unwrap();
    assert_eq!(run(&engine, &["logout"]).await.unwrap(), "logged out\n");
    assert!(engine.current_user().await.is_none());
}

#[tokio::test]
async fn watch_is_not_one_shot() {
    let (engine, _) = make_engine();
    assert!(run(&engine, &["watch"]).await.is_err());
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        auth_delay_ms: 0,
        ..EngineConfig::default()
    };

    let store = FileStore::open(dir.path()).await.unwrap();
    let engine = EntitlementEngine::new(Arc::new(store), config.clone());
    engine.load().await;
    execute(
        &engine,
        &Command::Register {
            email: "ann@example.com".into(),
            password: "pw".into(),
            name: "Ann".into(),
        },
        &mut Vec::new(),
    )
    .await
    .unwrap();
    execute(&engine, &Command::ActivatePremium { days: 2 }, &mut Vec::new())
        .await
        .unwrap();

    let store = FileStore::open(dir.path()).await.unwrap();
    let reopened = EntitlementEngine::new(Arc::new(store), config);
    let user = reopened.load().await.unwrap();
    assert_eq!(user.email(), "ann@example.com");
    assert!(user.is_premium());
    assert!(reopened.status().await.is_usable());
}

// ── Watch ────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<Threshold>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &TrialNotification) {
        self.seen.lock().unwrap().push(notification.threshold);
    }
}

#[tokio::test(start_paused = true)]
async fn watch_delivers_notifications_until_shutdown() {
    let (engine, clock) = make_engine();
    run(&engine, &["register", "a@b.com", "--password", "pw", "--name", "Ann"])
        .await
        .unwrap();
    run(&engine, &["activate-premium", "--days", "1"]).await.unwrap();
    clock.advance(TimeDelta::days(1) - TimeDelta::seconds(3400));

    let sink = Arc::new(RecordingSink::default());
    watch(
        &engine,
        sink.clone(),
        SchedulerConfig::default(),
        tokio::time::sleep(Duration::from_millis(10)),
    )
    .await;

    assert_eq!(*sink.seen.lock().unwrap(), vec![Threshold::OneHour]);
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn watch_heals_lapsed_grant() {
    let (engine, clock) = make_engine();
    run(&engine, &["register", "a@b.com", "--password", "pw", "--name", "Ann"])
        .await
        .unwrap();
    run(&engine, &["activate-premium", "--days", "1"]).await.unwrap();
    clock.advance(TimeDelta::days(2));
    assert!(engine.current_user().await.unwrap().is_premium());

    let sink = Arc::new(RecordingSink::default());
    watch(
        &engine,
        sink.clone(),
        SchedulerConfig::default(),
        tokio::time::sleep(Duration::from_secs(90)),
    )
    .await;

    assert!(!engine.current_user().await.unwrap().is_premium());
    assert!(sink.seen.lock().unwrap().is_empty());
}
