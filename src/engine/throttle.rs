//! Heartbeat rate limiting.
//!
//! Tracks the last confirmed delivery. Only delivered notices move the
//! clock, so a failed heartbeat is retried on the next cycle.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct NotificationThrottle {
    interval: Duration,
    last_delivered: Option<DateTime<Utc>>,
}

impl NotificationThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_delivered: None,
        }
    }

    /// Whether a heartbeat may go out at `now`. Always true before the
    /// first delivery.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_delivered {
            Some(last) => now - last >= self.interval,
            None => true,
        }
    }

    /// Record a confirmed delivery (heartbeat or urgent).
    pub fn record_delivery(&mut self, at: DateTime<Utc>) {
        self.last_delivered = Some(at);
    }

    pub fn last_delivered(&self) -> Option<DateTime<Utc>> {
        self.last_delivered
    }
}
