//! Connection-health monitoring.
//!
//! The monitor only watches inbound silence. It never touches the retry
//! counter; the session reads [`HealthMonitor::is_lost`] before sending.

use core::time::Duration;

use crate::{
    spawn::Spawn,
    timer::{TimerSlot, TimerTicket},
};

/// Declares the connection lost after a period without inbound frames.
#[derive(Debug)]
pub struct HealthMonitor {
    budget: Duration,
    timer: TimerSlot,
    lost: bool,
}

impl HealthMonitor {
    /// Create a disarmed monitor with the given silence budget.
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            timer: TimerSlot::new(),
            lost: false,
        }
    }

    /// Record a successfully processed frame: clear the lost flag and restart
    /// the silence timer.
    ///
    /// Returns `true` if the connection had been marked lost.
    pub fn frame_received<S, T, F>(
        &mut self,
        spawner: &S,
        tx: &async_channel::Sender<T>,
        fire: F,
    ) -> bool
    where
        S: Spawn + ?Sized,
        T: Send + 'static,
        F: FnOnce(TimerTicket) -> T,
    {
        self.timer.schedule(spawner, self.budget, tx, fire);
        core::mem::replace(&mut self.lost, false)
    }

    /// Handle a silence-timer expiry.
    ///
    /// Returns `true` if this expiry marked the connection lost; stale
    /// expiries are ignored.
    pub fn expire(&mut self, ticket: TimerTicket) -> bool {
        if !self.timer.take(ticket) {
            return false;
        }
        tracing::warn!(budget = ?self.budget, "no frame received within silence budget");
        self.lost = true;
        true
    }

    /// Stop watching without touching the lost flag.
    pub fn disarm(&mut self) {
        self.timer.cancel();
    }

    /// Whether the connection is currently considered lost.
    #[must_use]
    pub const fn is_lost(&self) -> bool {
        self.lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::TokioSpawn;

    const BUDGET: Duration = Duration::from_millis(40_000);

    #[tokio::test(start_paused = true)]
    async fn silence_marks_lost_until_next_frame() {
        let (tx, rx) = async_channel::unbounded();
        let mut monitor = HealthMonitor::new(BUDGET);

        assert!(!monitor.frame_received(&TokioSpawn, &tx, |t| t));

        tokio::time::sleep(BUDGET - Duration::from_millis(1)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let ticket = rx.try_recv().expect("silence timer fired");
        assert!(monitor.expire(ticket));
        assert!(monitor.is_lost());

        // Still lost after more silence.
        tokio::time::sleep(BUDGET * 2).await;
        assert!(monitor.is_lost());

        assert!(monitor.frame_received(&TokioSpawn, &tx, |t| t));
        assert!(!monitor.is_lost());
    }

    #[tokio::test(start_paused = true)]
    async fn frames_keep_the_connection_alive() {
        let (tx, rx) = async_channel::unbounded();
        let mut monitor = HealthMonitor::new(BUDGET);

        for _ in 0..5 {
            monitor.frame_received(&TokioSpawn, &tx, |t| t);
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        assert!(rx.try_recv().is_err());
        assert!(!monitor.is_lost());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_after_disarm_is_ignored() {
        let (tx, rx) = async_channel::unbounded();
        let mut monitor = HealthMonitor::new(Duration::from_millis(10));
        monitor.frame_received(&TokioSpawn, &tx, |t| t);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let ticket = rx.try_recv().expect("fired before disarm");
        monitor.disarm();

        assert!(!monitor.expire(ticket));
        assert!(!monitor.is_lost());
    }
}
