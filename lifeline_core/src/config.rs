//! Session tuning knobs.

use core::time::Duration;

/// Default number of consecutive failures tolerated before giving up.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Default delay before a reconnect attempt, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_500;

/// Default pause between resetting one transport and opening the next.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 300;

/// Default silence budget. Servers ping every 30 s.
pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 40_000;

/// Configuration for a [`SessionManager`](crate::session::SessionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Consecutive failures tolerated. Reaching it switches to polling;
    /// exceeding it is fatal.
    pub retry_budget: u32,

    /// Fixed backoff before each reconnect attempt.
    pub retry_delay_ms: u64,

    /// Pause after resetting a transport before opening its replacement.
    pub settle_delay_ms: u64,

    /// Inbound silence after which the connection is considered lost.
    pub silence_timeout_ms: u64,
}

impl SessionConfig {
    /// Retry backoff as a [`Duration`].
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Settle delay as a [`Duration`].
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Silence budget as a [`Duration`].
    #[must_use]
    pub const fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            silence_timeout_ms: DEFAULT_SILENCE_TIMEOUT_MS,
        }
    }
}
