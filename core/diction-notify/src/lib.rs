//! Trial-ending notification scheduler for the diction coach.
//!
//! Observes an [`EntitlementEngine`](diction_entitlement::EntitlementEngine)
//! and nudges the user as the premium trial runs out, at 12, 6, 2 and 1 hour
//! remaining. Each threshold fires at most once per scheduler session.
//!
//! ## Components
//!
//! - **Threshold**: the four marks, their windows and message payloads
//! - **ThresholdTracker**: the pure at-most-once state machine
//! - **NotificationScheduler**: polls the engine and drives the tracker
//! - **NotificationSink**: the presentation collaborator that shows messages

mod scheduler;
mod sink;
mod threshold;

pub use scheduler::{NotificationScheduler, SchedulerConfig, SchedulerHandle};
pub use sink::{LogSink, NotificationSink};
pub use threshold::{Threshold, ThresholdTracker, TrialNotification};
