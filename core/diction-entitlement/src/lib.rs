//! Premium and trial entitlement engine for the diction coach.
//!
//! This crate handles:
//! - The single local user profile (login, register, logout, updates)
//! - Time-bounded premium grants and the one-time product purchase
//! - Remaining-time computation against the wall clock
//! - Periodic self-heal of grants that lapsed while the flag was still set
//!
//! # Consistency
//!
//! - **Write-through**: every mutation is persisted immediately, last write wins
//! - **Best-effort durability**: storage failures are logged and the in-memory
//!   state keeps working; only login and register report them
//! - **Lazy expiry on load**: a lapsed grant is cleared in memory at load time
//!   and durably by the next self-heal pass
//!
//! # Example
//!
//! ```no_run
//! use diction_entitlement::{EngineConfig, EntitlementEngine};
//! use diction_storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> diction_entitlement::EntitlementResult<()> {
//! let engine = EntitlementEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//! engine.load().await;
//! engine.start();
//!
//! engine.register("ann@example.com", "secret", "Ann").await?;
//! engine.activate_premium(3).await;
//! assert!(engine.status().await.is_usable());
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod events;
mod status;
mod user;

pub use engine::{DEFAULT_STORAGE_KEY, EngineConfig, EntitlementEngine};
pub use error::{EntitlementError, EntitlementResult};
pub use events::EntitlementEvent;
pub use status::{DEFAULT_TRIAL_DAYS, PremiumStatus};
pub use user::{User, UserUpdate};
