//! Core type definitions for the diction coach entitlement core.
//!
//! This crate defines the small set of types shared by every other crate:
//! - User identifiers (UUID v7)
//! - The wall-clock `Clock` collaborator and a controllable test clock
//! - Calendar-day arithmetic used for premium grants

mod clock;
mod ids;

pub use clock::{Clock, ManualClock, SystemClock, add_calendar_days, add_local_days};
pub use ids::UserId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
