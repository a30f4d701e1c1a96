//! Shared test helpers for entitlement tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use diction_entitlement::{DEFAULT_STORAGE_KEY, EngineConfig, EntitlementEngine};
use diction_storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
use diction_types::ManualClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A fixed January instant, clear of DST transitions for a few weeks.
pub fn fixed_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap()
}

/// Engine config without the simulated auth delay.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        auth_delay_ms: 0,
        ..EngineConfig::default()
    }
}

/// Builds an engine over a memory store and a manual clock at `fixed_start`.
pub fn make_engine() -> (EntitlementEngine, Arc<MemoryStore>, ManualClock) {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(fixed_start());
    let engine =
        EntitlementEngine::with_clock(store.clone(), Arc::new(clock.clone()), test_config());
    (engine, store, clock)
}

/// Builds an engine over a store whose failures can be switched on.
pub fn make_engine_with_flaky_store() -> (EntitlementEngine, Arc<FlakyStore>, ManualClock) {
    let store = Arc::new(FlakyStore::default());
    let clock = ManualClock::new(fixed_start());
    let engine =
        EntitlementEngine::with_clock(store.clone(), Arc::new(clock.clone()), test_config());
    (engine, store, clock)
}

/// Reads the stored user record as JSON.
pub async fn stored_record(store: &dyn KeyValueStore) -> Option<serde_json::Value> {
    store
        .get(DEFAULT_STORAGE_KEY)
        .await
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

/// Writes a raw user record, bypassing the engine.
pub async fn seed_record(store: &dyn KeyValueStore, record: serde_json::Value) {
    store
        .set(DEFAULT_STORAGE_KEY, &record.to_string())
        .await
        .unwrap();
}

/// A premium record whose grant ended at `expires_at`.
pub fn premium_record(expires_at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "id": "0192a3b4-c5d6-7e8f-9a0b-1c2d3e4f5a6b",
        "email": "ann@example.com",
        "name": "Ann",
        "isPremium": true,
        "hasProduct": false,
        "createdAt": "2026-01-01T08:00:00Z",
        "premiumExpiresAt": expires_at.to_rfc3339(),
        "trialStartedAt": "2026-01-02T08:00:00Z",
    })
}

/// A memory store that fails reads or writes on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("read refused".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("write refused".into()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("write refused".into()));
        }
        self.inner.remove(key).await
    }
}
