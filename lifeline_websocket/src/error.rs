//! Error types for the WebSocket transport.

use lifeline_core::timeout::TimedOut;
use thiserror::Error;

/// Problem while opening the connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// WebSocket connection error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The connection did not open in time.
    #[error("connect timed out")]
    TimedOut(#[from] TimedOut),
}

/// Problem while the connection was open.
#[derive(Debug, Error)]
pub enum RunError {
    /// Reading or writing failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The peer closed the connection.
    #[error("closed by peer")]
    ClosedByPeer,
}
