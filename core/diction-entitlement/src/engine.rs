//! Entitlement engine: owns the current user and its premium grant.
//!
//! The engine is the only writer of the persisted user record. Every mutation
//! is applied to the in-memory copy first and then written through to the
//! store; a failed write is logged and the in-memory state stays authoritative.

use crate::error::{EntitlementError, EntitlementResult};
use crate::events::{EVENT_CHANNEL_CAPACITY, EntitlementEvent};
use crate::status::PremiumStatus;
use crate::user::{User, UserUpdate};
use diction_storage::KeyValueStore;
use diction_types::{Clock, SystemClock, add_local_days};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Key the user record is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "diction_coach_user";

/// Configuration for the entitlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Store key for the user record.
    pub storage_key: String,
    /// Period of the self-heal check (seconds).
    pub self_heal_interval_secs: u64,
    /// Simulated authentication round-trip (ms).
    pub auth_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            self_heal_interval_secs: 60,
            auth_delay_ms: 800,
        }
    }
}

impl EngineConfig {
    /// Self-heal period, never shorter than one second.
    #[must_use]
    pub fn self_heal_interval(&self) -> Duration {
        Duration::from_secs(self.self_heal_interval_secs.max(1))
    }

    #[must_use]
    pub fn auth_delay(&self) -> Duration {
        Duration::from_millis(self.auth_delay_ms)
    }
}

struct HealTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    config: EngineConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    user: RwLock<Option<User>>,
    events: broadcast::Sender<EntitlementEvent>,
    heal_task: Mutex<Option<HealTask>>,
}

/// Single source of truth for the current user's entitlement.
///
/// Cheap to clone; clones share state. The hosting application owns one
/// engine and hands clones to its consumers.
#[derive(Clone)]
pub struct EntitlementEngine {
    inner: Arc<Inner>,
}

impl EntitlementEngine {
    /// Creates an engine reading the system wall clock.
    pub fn new(store: Arc<dyn KeyValueStore>, config: EngineConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Creates an engine with a custom clock.
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                clock,
                user: RwLock::new(None),
                events,
                heal_task: Mutex::new(None),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Subscribes to state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<EntitlementEvent> {
        self.inner.events.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Reads the persisted user, if any, and makes it current.
    ///
    /// A grant whose expiry has passed is cleared in memory only; the stored
    /// record keeps the stale flag until the next write. Read and parse
    /// failures leave the engine logged out.
    pub async fn load(&self) -> Option<User> {
        let key = &self.inner.config.storage_key;
        let raw = match self.inner.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored user under {key}");
                *self.inner.user.write().await = None;
                return None;
            }
            Err(e) => {
                warn!("failed to read stored user: {e}");
                *self.inner.user.write().await = None;
                return None;
            }
        };

        let mut user: User = match serde_json::from_str(&raw) {
            Ok(user) => user,
            Err(e) => {
                warn!("stored user record is unreadable: {e}");
                *self.inner.user.write().await = None;
                return None;
            }
        };

        if user.is_expired_at(self.inner.clock.now()) {
            info!("premium grant for {} expired while closed", user.id());
            user.clear_premium();
        }

        info!("loaded user {}", user.id());
        *self.inner.user.write().await = Some(user.clone());
        Some(user)
    }

    /// Starts the periodic self-heal task. Calling it again while the task
    /// runs does nothing.
    ///
    /// The task lives until [`shutdown`](Self::shutdown), not until logout.
    /// Ticks with nobody logged in are no-ops, and a later login is covered
    /// without restarting it.
    pub fn start(&self) {
        let mut slot = self
            .inner
            .heal_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return;
        }

        let period = self.inner.config.self_heal_interval();
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_self_heal(Arc::downgrade(&self.inner), period, stop_rx));
        *slot = Some(HealTask { stop, handle });
        debug!("self-heal task started, period {period:?}");
    }

    /// Returns true while the self-heal task is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .heal_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops the self-heal task and waits for it to finish.
    pub async fn shutdown(&self) {
        let task = self
            .inner
            .heal_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.stop.send(());
            if let Err(e) = task.handle.await {
                warn!("self-heal task ended abnormally: {e}");
            }
        }
    }

    // ── Account operations ───────────────────────────────────────

    /// Logs in with an existing account.
    ///
    /// Without a `name`, the local part of the email becomes the display
    /// name. If persisting fails the error is returned, but the user is
    /// logged in for this session regardless.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> EntitlementResult<User> {
        let email = email.trim();
        validate_credentials(email, password)?;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => email.split('@').next().unwrap_or(email).to_string(),
        };
        self.sign_in(email, name).await
    }

    /// Registers a new account. Same persistence semantics as [`login`].
    ///
    /// [`login`]: Self::login
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> EntitlementResult<User> {
        let email = email.trim();
        validate_credentials(email, password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EntitlementError::InvalidCredentials("name is empty".to_string()));
        }
        self.sign_in(email, name.to_string()).await
    }

    async fn sign_in(&self, email: &str, name: String) -> EntitlementResult<User> {
        // Stands in for the auth service round-trip.
        let delay = self.inner.config.auth_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let user = User::new(email, name, self.inner.clock.now());
        *self.inner.user.write().await = Some(user.clone());
        info!("signed in as {}", user.id());
        self.emit(EntitlementEvent::LoggedIn(user.id()));

        self.persist(&user).await?;
        Ok(user)
    }

    /// Forgets the current user and deletes the stored record.
    pub async fn logout(&self) {
        let previous = self.inner.user.write().await.take();
        if let Err(e) = self.inner.store.remove(&self.inner.config.storage_key).await {
            warn!("failed to delete stored user: {e}");
        }
        if let Some(user) = previous {
            info!("logged out {}", user.id());
            self.emit(EntitlementEvent::LoggedOut(user.id()));
        }
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Merges `update` into the current user and persists it. Returns the
    /// updated record, or `None` when nobody is logged in.
    pub async fn update_user(&self, update: UserUpdate) -> Option<User> {
        let user = self
            .mutate(|user| {
                user.apply(update);
                true
            })
            .await?;
        self.emit(EntitlementEvent::UserUpdated(user.id()));
        Some(user)
    }

    /// Grants premium for `duration_days` calendar days from now.
    ///
    /// The trial anchor is set on the first activation only; later calls
    /// extend or shorten the grant without touching it.
    pub async fn activate_premium(&self, duration_days: u32) -> Option<User> {
        let now = self.inner.clock.now();
        let expires_at = add_local_days(now, duration_days);
        let user = self
            .mutate(|user| {
                user.grant_premium(now, expires_at);
                true
            })
            .await?;
        info!("premium granted to {} until {expires_at}", user.id());
        self.emit(EntitlementEvent::PremiumActivated {
            user_id: user.id(),
            expires_at,
        });
        Some(user)
    }

    /// Records the one-time product purchase.
    pub async fn activate_product(&self) -> Option<User> {
        let user = self
            .mutate(|user| {
                user.grant_product();
                true
            })
            .await?;
        info!("product activated for {}", user.id());
        self.emit(EntitlementEvent::ProductActivated(user.id()));
        Some(user)
    }

    /// Clears a premium flag whose grant has run out, and persists the
    /// correction. Returns true if anything changed.
    pub async fn self_heal(&self) -> bool {
        let now = self.inner.clock.now();
        let healed = self
            .mutate(|user| {
                if !(user.is_premium() && user.is_expired_at(now)) {
                    return false;
                }
                user.apply(UserUpdate::expire_premium());
                true
            })
            .await;
        let Some(user) = healed else {
            return false;
        };
        info!("premium grant for {} lapsed", user.id());
        self.emit(EntitlementEvent::UserUpdated(user.id()));
        self.emit(EntitlementEvent::PremiumExpired(user.id()));
        true
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Returns a copy of the current user.
    pub async fn current_user(&self) -> Option<User> {
        self.inner.user.read().await.clone()
    }

    /// Returns the current user or `NotAuthenticated`.
    pub async fn require_user(&self) -> EntitlementResult<User> {
        self.current_user()
            .await
            .ok_or(EntitlementError::NotAuthenticated)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.user.read().await.is_some()
    }

    /// Whole seconds of premium left, read against the clock on each call.
    pub async fn remaining_time(&self) -> u64 {
        let now = self.inner.clock.now();
        self.inner
            .user
            .read()
            .await
            .as_ref()
            .map_or(0, |user| user.remaining_secs(now))
    }

    /// Returns the premium status right now.
    pub async fn status(&self) -> PremiumStatus {
        let now = self.inner.clock.now();
        self.inner
            .user
            .read()
            .await
            .as_ref()
            .map_or(PremiumStatus::Free, |user| user.status_at(now))
    }

    // ── Internals ────────────────────────────────────────────────

    /// Applies `f` to the current user under the write lock, then writes the
    /// result through. `f` returns false to skip the write.
    async fn mutate(&self, f: impl FnOnce(&mut User) -> bool) -> Option<User> {
        let snapshot = {
            let mut guard = self.inner.user.write().await;
            let user = guard.as_mut()?;
            if !f(user) {
                return None;
            }
            user.clone()
        };
        if let Err(e) = self.persist(&snapshot).await {
            warn!("failed to persist user {}: {e}", snapshot.id());
        }
        Some(snapshot)
    }

    async fn persist(&self, user: &User) -> EntitlementResult<()> {
        let json = serde_json::to_string(user)?;
        self.inner
            .store
            .set(&self.inner.config.storage_key, &json)
            .await?;
        debug!("persisted user {}", user.id());
        Ok(())
    }

    fn emit(&self, event: EntitlementEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

fn validate_credentials(email: &str, password: &str) -> EntitlementResult<()> {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !well_formed {
        return Err(EntitlementError::InvalidCredentials(format!(
            "malformed email address: {email:?}"
        )));
    }
    if password.is_empty() {
        return Err(EntitlementError::InvalidCredentials("password is empty".to_string()));
    }
    Ok(())
}

async fn run_self_heal(inner: Weak<Inner>, period: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                EntitlementEngine { inner }.self_heal().await;
            }
        }
    }
    debug!("self-heal task stopped");
}
