//! Errors surfaced by the session layer.

use thiserror::Error;

use crate::frame::FrameError;

/// An error reported to the application through
/// [`SessionEvent::Error`](crate::session::SessionEvent::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The handshake reply could not be used. The session retries.
    #[error("handshake failed: {0}")]
    Handshake(FrameError),

    /// A steady-state frame broke the protocol. Not retried.
    #[error("invalid data received from server: {data:?}")]
    Framing {
        /// The offending frame.
        data: String,
    },

    /// Every reconnect attempt failed. Not retried.
    #[error("failed to establish a connection after {attempts} attempts")]
    RetryBudgetExhausted {
        /// Failures counted before giving up.
        attempts: u32,
    },
}

/// Problem handing a frame to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportSendError {
    /// The transport has not reported open yet.
    #[error("transport is not open")]
    NotOpen,

    /// The transport closed, failed, or was reset.
    #[error("transport is closed")]
    Closed,
}

/// The session actor has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session closed")]
pub struct SessionClosed;
