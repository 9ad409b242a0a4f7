//! One-shot, self-clearing timers that report into an actor's inbox.
//!
//! A [`TimerSlot`] owns at most one pending timer. Scheduling aborts the
//! previous one and bumps the slot's generation, so an expiry that already
//! reached the inbox before the reschedule is still recognised as stale.

use core::time::Duration;

use futures::{future::AbortHandle, FutureExt};

use crate::spawn::Spawn;

/// Identifies one scheduling of a [`TimerSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTicket(u64);

/// Holds at most one pending timer.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: Option<AbortHandle>,
}

impl TimerSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending timer with one that posts `fire(ticket)` to `tx`
    /// after `delay`.
    pub fn schedule<S, T, F>(
        &mut self,
        spawner: &S,
        delay: Duration,
        tx: &async_channel::Sender<T>,
        fire: F,
    ) -> TimerTicket
    where
        S: Spawn + ?Sized,
        T: Send + 'static,
        F: FnOnce(TimerTicket) -> T,
    {
        self.cancel();
        let ticket = TimerTicket(self.generation);
        let msg = fire(ticket);
        let tx = tx.clone();
        let handle = spawner.spawn(
            async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(msg).await;
            }
            .boxed(),
        );
        self.pending = Some(handle);
        ticket
    }

    /// Abort the pending timer, if any, and invalidate its ticket.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    /// Claim an expiry. Returns `true` only for the currently pending timer,
    /// which the slot then forgets.
    pub fn take(&mut self, ticket: TimerTicket) -> bool {
        if ticket.0 == self.generation && self.pending.is_some() {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Whether a timer is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
