//! Deadlines for network operations.

use core::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use thiserror::Error;

/// A trait for time-limiting futures.
///
/// Implementations wrap a future with a deadline, returning [`TimedOut`]
/// if the inner future does not complete within the given duration.
pub trait Timeout: Clone + Send + Sync + 'static {
    /// Wrap a future with a timeout.
    fn timeout<'a, T: Send + 'a>(
        &self,
        dur: Duration,
        fut: BoxFuture<'a, T>,
    ) -> BoxFuture<'a, Result<T, TimedOut>>;
}

/// An error indicating that an operation has timed out.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
#[error("Operation timed out")]
pub struct TimedOut;

/// Tokio-backed timeout wrapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutTokio;

impl Timeout for TimeoutTokio {
    fn timeout<'a, T: Send + 'a>(
        &self,
        dur: Duration,
        fut: BoxFuture<'a, T>,
    ) -> BoxFuture<'a, Result<T, TimedOut>> {
        async move { tokio::time::timeout(dur, fut).await.map_err(|_| TimedOut) }.boxed()
    }
}
