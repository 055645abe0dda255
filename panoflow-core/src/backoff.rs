use std::time::Duration;

use tracing::warn;

use crate::cycle::CycleReport;

/// Phrase the store uses when the shared drive is full.
pub const QUOTA_EXCEEDED_SIGNAL: &str = "drive storage quota has been exceeded";

pub fn is_quota_exhausted(message: &str) -> bool {
    message.to_lowercase().contains(QUOTA_EXCEEDED_SIGNAL)
}

/// Chooses the pause before the next cycle.
#[derive(Debug, Clone)]
pub struct BackoffScheduler {
    poll_interval: Duration,
    quota_cooldown: Duration,
    quota_cooldown_pending: bool,
}

impl BackoffScheduler {
    pub fn new(poll_interval: Duration, quota_cooldown: Duration) -> Self {
        Self {
            poll_interval,
            quota_cooldown,
            quota_cooldown_pending: false,
        }
    }

    /// Arm the cooldown when any stage of `report` hit the quota.
    pub fn observe(&mut self, report: &CycleReport) {
        if report
            .errors
            .iter()
            .any(|err| is_quota_exhausted(&err.to_string()))
        {
            warn!(
                target: "panoflow::cycle",
                cooldown_secs = self.quota_cooldown.as_secs(),
                "Storage quota exhausted; cooling down"
            );
            self.quota_cooldown_pending = true;
        }
    }

    /// Returns the cooldown once after it was armed, else the poll interval.
    pub fn next_delay(&mut self) -> Duration {
        let pending = std::mem::take(&mut self.quota_cooldown_pending);
        if pending {
            self.quota_cooldown
        } else {
            self.poll_interval
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        self.quota_cooldown_pending
    }
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(86_400))
    }
}
