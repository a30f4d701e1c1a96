//! Notification scheduler: polls the engine and fires threshold messages.

use crate::sink::NotificationSink;
use crate::threshold::{Threshold, ThresholdTracker};
use diction_entitlement::EntitlementEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Configuration for the notification scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often remaining time is checked (seconds).
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    /// Poll period, never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// One observing session over the engine's trial state.
///
/// The firing marker lives only as long as this value; a new scheduler
/// starts with a clean marker and may fire thresholds again.
pub struct NotificationScheduler {
    engine: EntitlementEngine,
    sink: Arc<dyn NotificationSink>,
    tracker: ThresholdTracker,
    config: SchedulerConfig,
}

impl NotificationScheduler {
    pub fn new(
        engine: EntitlementEngine,
        sink: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            engine,
            sink,
            tracker: ThresholdTracker::new(),
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The most recently fired threshold in this session.
    pub fn last_fired(&self) -> Option<Threshold> {
        self.tracker.last_fired()
    }

    /// Runs one evaluation and notifies the sink if a threshold fires.
    ///
    /// Nothing fires unless a premium user with a trial anchor is loaded and
    /// some premium time remains.
    pub async fn check(&mut self) -> Option<Threshold> {
        let user = self.engine.current_user().await?;
        if !user.is_premium() || user.trial_started_at().is_none() {
            return None;
        }
        let remaining = self.engine.remaining_time().await;
        if remaining == 0 {
            return None;
        }

        let threshold = self.tracker.evaluate(remaining)?;
        info!("trial threshold {threshold} reached, {remaining}s left");
        self.sink.notify(&threshold.notification());
        Some(threshold)
    }

    /// Moves the scheduler onto a background task that checks immediately
    /// and then once per poll interval.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(stop_rx));
        SchedulerHandle {
            stop: Some(stop),
            handle,
        }
    }

    async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        let period = self.config.poll_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("notification scheduler started, period {period:?}");

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
        debug!("notification scheduler stopped");
    }
}

/// Owner of a running scheduler task. Dropping it stops the task.
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Returns true while the task is running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!("notification scheduler ended abnormally: {e}");
        }
    }
}
