use crate::state_machine::Trigger;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// A trigger waiting for its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub trigger: Trigger,
    pub delay: Duration,
    pub deadline: Instant,
}

/// The one timer the controller owns. Arming replaces whatever was pending,
/// so at most one trigger can ever be waiting to fire.
#[derive(Debug, Default)]
pub struct TimerSlot {
    pending: Option<Pending>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, trigger: Trigger, delay: Duration) {
        if let Some(replaced) = self.pending.take() {
            debug!(trigger = ?replaced.trigger, "replacing pending timer");
        }
        info!(?trigger, delay_ms = delay.as_millis() as u64, "scheduling trigger");
        self.pending = Some(Pending {
            trigger,
            delay,
            deadline: Instant::now() + delay,
        });
    }

    /// Cancel the pending timer, if any.
    pub fn clear(&mut self) {
        if let Some(cancelled) = self.pending.take() {
            info!(trigger = ?cancelled.trigger, "cleared pending timer");
        }
    }

    /// Remove and return the pending trigger. Called once its deadline passed.
    pub fn take(&mut self) -> Option<Trigger> {
        self.pending.take().map(|p| p.trigger)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    /// Sleep for `delay` inside a running command. The slot is emptied first
    /// so nothing scheduled earlier can fire behind the command's back.
    pub async fn wait(&mut self, delay: Duration) {
        self.clear();
        debug!(delay_ms = delay.as_millis() as u64, "waiting");
        tokio::time::sleep(delay).await;
    }
}
