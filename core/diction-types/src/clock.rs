//! Wall-clock time source and calendar arithmetic.
//!
//! Premium grants expire at a wall-clock instant, so everything here works on
//! `DateTime<Utc>` rather than a monotonic clock. A clock adjustment on the
//! device moves expiry with it.

use chrono::{DateTime, Days, LocalResult, TimeDelta, TimeZone, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying instant, so a test can hand one clone to the
/// engine and keep another to advance time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock to an absolute instant (backwards is allowed).
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Moves the clock forward by `delta` (a negative delta moves it back).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Adds `days` calendar days to `instant` on the calendar of `tz`.
///
/// The local wall time is kept, so across a DST change the result is 23 or 25
/// hours per shifted day rather than a fixed 86 400 s. When the target local
/// time falls in a DST gap the fixed-length result is returned; when it is
/// ambiguous the earlier instant wins.
pub fn add_calendar_days<Tz: TimeZone>(
    instant: DateTime<Utc>,
    days: u32,
    tz: &Tz,
) -> DateTime<Utc> {
    let fixed = instant
        .checked_add_signed(TimeDelta::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let Some(target) = instant
        .with_timezone(tz)
        .naive_local()
        .checked_add_days(Days::new(u64::from(days)))
    else {
        return fixed;
    };

    match tz.from_local_datetime(&target) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => fixed,
    }
}

/// Adds `days` calendar days on the device's local calendar.
pub fn add_local_days(instant: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    add_calendar_days(instant, days, &chrono::Local)
}
