//! Error types for the HTTP long-poll transport.

use lifeline_core::{frame::FrameError, timeout::TimedOut};
use thiserror::Error;

/// Why a polling transport failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// Server returned an unexpected status code.
    #[error("unexpected status {status}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// A response had no `&` delimiter.
    #[error("missing delimiter in response {0:?}")]
    MissingDelimiter(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    TimedOut(#[from] TimedOut),
}

/// Errors from the reconnect endpoint.
#[derive(Debug, Error)]
pub enum ReconnectError {
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// Server returned an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The response body as a string.
        body: String,
    },

    /// The reply was neither credentials nor a refresh instruction.
    #[error("malformed reconnect reply: {0}")]
    Malformed(#[from] FrameError),

    /// The request did not complete in time.
    #[error("reconnect request timed out")]
    TimedOut(#[from] TimedOut),
}
