//! The persisted user record and partial updates to it.

use crate::status::PremiumStatus;
use chrono::{DateTime, Utc};
use diction_types::UserId;
use serde::{Deserialize, Serialize};

/// The single local user profile.
///
/// Serialized with camelCase field names; absent timestamps are omitted.
/// `id`, `created_at` and `trial_started_at` (once set) never change, and
/// `has_product` is never unset, so the fields are private and only this
/// crate mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: UserId,
    email: String,
    name: String,
    is_premium: bool,
    has_product: bool,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    premium_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trial_started_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a fresh, non-premium user.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            name: name.into(),
            is_premium: false,
            has_product: false,
            created_at,
            premium_expires_at: None,
            trial_started_at: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.is_premium
    }

    #[must_use]
    pub fn has_product(&self) -> bool {
        self.has_product
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn premium_expires_at(&self) -> Option<DateTime<Utc>> {
        self.premium_expires_at
    }

    /// The first-ever premium activation instant.
    #[must_use]
    pub fn trial_started_at(&self) -> Option<DateTime<Utc>> {
        self.trial_started_at
    }

    /// Whole seconds until `premium_expires_at`, floored, never negative.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.premium_expires_at
            .map(|exp| u64::try_from((exp - now).num_seconds()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Returns true if an expiry is recorded and has been reached.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_expires_at.is_some_and(|exp| exp <= now)
    }

    /// Computes the premium status at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> PremiumStatus {
        if !self.is_premium {
            return PremiumStatus::Free;
        }
        match self.remaining_secs(now) {
            0 => PremiumStatus::Lapsed,
            remaining_secs => PremiumStatus::Active { remaining_secs },
        }
    }

    /// Merges `update` into this record, field by field.
    pub(crate) fn apply(&mut self, update: UserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(is_premium) = update.is_premium {
            self.is_premium = is_premium;
        }
        if let Some(expires_at) = update.premium_expires_at {
            self.premium_expires_at = expires_at;
        }
    }

    pub(crate) fn clear_premium(&mut self) {
        self.is_premium = false;
        self.premium_expires_at = None;
    }

    /// Starts a premium grant ending at `expires_at`. The trial anchor is
    /// only recorded on the first activation.
    pub(crate) fn grant_premium(&mut self, now: DateTime<Utc>, expires_at: DateTime<Utc>) {
        self.is_premium = true;
        self.premium_expires_at = Some(expires_at);
        self.trial_started_at.get_or_insert(now);
    }

    pub(crate) fn grant_product(&mut self) {
        self.has_product = true;
    }
}

/// A shallow partial update to a [`User`].
///
/// `None` leaves a field untouched. `premium_expires_at` is doubly optional
/// so an update can clear it with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_premium: Option<bool>,
    pub premium_expires_at: Option<Option<DateTime<Utc>>>,
}

impl UserUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The update that ends a premium grant.
    #[must_use]
    pub fn expire_premium() -> Self {
        Self {
            is_premium: Some(false),
            premium_expires_at: Some(None),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn premium(mut self, is_premium: bool) -> Self {
        self.is_premium = Some(is_premium);
        self
    }

    #[must_use]
    pub fn premium_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.premium_expires_at = Some(expires_at);
        self
    }

    /// Returns true if the update touches no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
