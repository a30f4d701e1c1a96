//! State-change notifications published by the engine.

use chrono::{DateTime, Utc};
use diction_types::UserId;

/// Broadcast capacity; slow subscribers see `Lagged` past this.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Something about the current user's entitlement changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementEvent {
    /// A user logged in or registered.
    LoggedIn(UserId),
    /// The current user logged out.
    LoggedOut(UserId),
    /// Fields were merged into the current user.
    UserUpdated(UserId),
    /// A premium grant started.
    PremiumActivated {
        user_id: UserId,
        expires_at: DateTime<Utc>,
    },
    /// The self-heal pass ended a lapsed grant.
    PremiumExpired(UserId),
    /// The one-time product purchase was recorded.
    ProductActivated(UserId),
}
