//! Trial-ending thresholds and the at-most-once firing rule.
//!
//! The scheduler polls once a minute, so each threshold matches a window
//! wider than the poll period (five minutes, or the last nine minutes of the
//! final hour). The tracker's marker keeps a window from firing on every poll
//! that lands inside it.

use serde::{Deserialize, Serialize};
use std::fmt;

const SECS_PER_HOUR: u64 = 3600;

/// Remaining-time marks at which the user is nudged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Threshold {
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "2hours")]
    TwoHours,
    #[serde(rename = "6hours")]
    SixHours,
    #[serde(rename = "12hours")]
    TwelveHours,
}

impl Threshold {
    /// All thresholds in evaluation order.
    pub const ALL: [Threshold; 4] = [
        Threshold::OneHour,
        Threshold::TwoHours,
        Threshold::SixHours,
        Threshold::TwelveHours,
    ];

    /// Whole hours of trial left at this mark.
    #[must_use]
    pub const fn hours(&self) -> u64 {
        match self {
            Self::OneHour => 1,
            Self::TwoHours => 2,
            Self::SixHours => 6,
            Self::TwelveHours => 12,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneHour => "1hour",
            Self::TwoHours => "2hours",
            Self::SixHours => "6hours",
            Self::TwelveHours => "12hours",
        }
    }

    /// Returns true if `hours:minutes` remaining falls inside this window.
    #[must_use]
    pub fn matches(&self, hours: u64, minutes: u64) -> bool {
        match self {
            Self::OneHour => hours == 0 && minutes > 50 && minutes <= 60,
            other => hours == other.hours() && minutes <= 5,
        }
    }

    /// The fixed message shown for this threshold.
    #[must_use]
    pub const fn notification(&self) -> TrialNotification {
        let (title, message) = match self {
            Self::OneHour => (
                "1 hour of premium left",
                "Your trial ends within the hour. Squeeze in one more breathing set while every exercise is unlocked.",
            ),
            Self::TwoHours => (
                "2 hours of premium left",
                "Two hours to go. A quick tongue-twister round now keeps your streak going.",
            ),
            Self::SixHours => (
                "6 hours of premium left",
                "Your trial ends later today. Plan one full articulation session before it does.",
            ),
            Self::TwelveHours => (
                "12 hours of premium left",
                "Half a day of premium remains. Upgrade to keep the full pronunciation course.",
            ),
        };
        TrialNotification {
            threshold: *self,
            title,
            message,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload handed to a notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialNotification {
    pub threshold: Threshold,
    pub title: &'static str,
    pub message: &'static str,
}

/// Volatile "last fired" marker for one scheduler session.
#[derive(Debug, Clone, Default)]
pub struct ThresholdTracker {
    last_fired: Option<Threshold>,
}

impl ThresholdTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently fired threshold, if any.
    #[must_use]
    pub fn last_fired(&self) -> Option<Threshold> {
        self.last_fired
    }

    /// Forgets the marker, as a new session would.
    pub fn reset(&mut self) {
        self.last_fired = None;
    }

    /// Evaluates `remaining_secs` and returns the threshold to fire, if any.
    ///
    /// Rules are tried in [`Threshold::ALL`] order; a rule whose threshold is
    /// the current marker is skipped.
    pub fn evaluate(&mut self, remaining_secs: u64) -> Option<Threshold> {
        if remaining_secs == 0 {
            return None;
        }
        let hours = remaining_secs / SECS_PER_HOUR;
        let minutes = (remaining_secs % SECS_PER_HOUR) / 60;

        let hit = Threshold::ALL
            .into_iter()
            .find(|t| t.matches(hours, minutes) && self.last_fired != Some(*t))?;
        self.last_fired = Some(hit);
        Some(hit)
    }
}
