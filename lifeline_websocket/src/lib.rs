//! # Lifeline WebSocket transport
//!
//! The persistent [`Transport`](lifeline_core::transport::Transport): one
//! full-duplex WebSocket carrying text frames.
//!
//! ```text
//!  open() ──► spawn ──► connect (with deadline) ──► Open
//!                                   │
//!              ┌────────────────────┴───────────────────┐
//!              │ select!                                │
//!              │   outbound_rx ──► ws writer            │
//!              │   ws reader   ──► Message / Close      │
//!              │   cancelled   ──► Close frame, exit    │
//!              └────────────────────────────────────────┘
//! ```

pub mod error;
pub mod transport;

use core::time::Duration;

use url::Url;

pub use transport::WebSocketTransport;

/// Maximum inbound message size (16 MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default deadline for establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketOptions {
    /// `ws://` or `wss://` endpoint.
    pub url: Url,

    /// Deadline for the connection to open.
    pub connect_timeout: Duration,

    /// Largest inbound message accepted.
    pub max_message_size: usize,
}

impl WebSocketOptions {
    /// Options for `url` with default limits.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}
