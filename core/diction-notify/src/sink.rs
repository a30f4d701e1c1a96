//! Where trial notifications are delivered.

use crate::threshold::TrialNotification;
use tracing::info;

/// Presentation collaborator invoked once per threshold crossing.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &TrialNotification);
}

impl<F> NotificationSink for F
where
    F: Fn(&TrialNotification) + Send + Sync,
{
    fn notify(&self, notification: &TrialNotification) {
        self(notification);
    }
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &TrialNotification) {
        info!(
            "[{}] {}: {}",
            notification.threshold, notification.title, notification.message
        );
    }
}
