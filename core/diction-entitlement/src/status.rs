//! Derived premium status.

use serde::{Deserialize, Serialize};

/// Default length of the free trial grant, in calendar days.
pub const DEFAULT_TRIAL_DAYS: u32 = 3;

/// The premium state of a user at a given instant.
///
/// Never stored; always computed from the user record and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PremiumStatus {
    /// No premium grant.
    Free,
    /// Premium grant running.
    Active {
        /// Whole seconds until expiry.
        remaining_secs: u64,
    },
    /// The premium flag is still set but the grant has run out. Healed by
    /// the next self-heal pass.
    Lapsed,
}

impl PremiumStatus {
    /// Returns true if premium features should be unlocked.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Returns the remaining seconds, zero unless active.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        match self {
            Self::Active { remaining_secs } => *remaining_secs,
            Self::Free | Self::Lapsed => 0,
        }
    }
}
