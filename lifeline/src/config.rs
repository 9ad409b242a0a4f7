//! Client configuration.

use core::time::Duration;

use lifeline_core::SessionConfig;
use lifeline_http_longpoll::{
    LongPollOptions, DEFAULT_POLL_TIMEOUT, DEFAULT_RECONNECT_TIMEOUT, DEFAULT_SEND_TIMEOUT,
};
use lifeline_websocket::{WebSocketOptions, DEFAULT_CONNECT_TIMEOUT, MAX_MESSAGE_SIZE};
use url::Url;

use crate::{endpoints::Endpoints, error::EndpointError};

/// Everything needed to run a session against one server.
///
/// Only `base_url` is required when loading from a file; every other field
/// falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// `http(s)` base the endpoints are mounted under.
    pub base_url: Url,

    /// Retry, settle and silence tuning.
    #[cfg_attr(feature = "serde", serde(default))]
    pub session: SessionConfig,

    /// Use the persistent transport when possible. When `false`, every
    /// session starts on polling.
    #[cfg_attr(feature = "serde", serde(default = "defaults::persistent"))]
    pub persistent: bool,

    /// Deadline for the WebSocket to open.
    #[cfg_attr(feature = "serde", serde(default = "defaults::connect_timeout_ms"))]
    pub connect_timeout_ms: u64,

    /// Largest inbound WebSocket message.
    #[cfg_attr(feature = "serde", serde(default = "defaults::max_message_size"))]
    pub max_message_size: usize,

    /// Deadline for one held poll request.
    #[cfg_attr(feature = "serde", serde(default = "defaults::poll_timeout_ms"))]
    pub poll_timeout_ms: u64,

    /// Deadline for one `init` or send request.
    #[cfg_attr(feature = "serde", serde(default = "defaults::send_timeout_ms"))]
    pub send_timeout_ms: u64,

    /// Deadline for one reconnect request.
    #[cfg_attr(feature = "serde", serde(default = "defaults::reconnect_timeout_ms"))]
    pub reconnect_timeout_ms: u64,
}

impl ClientConfig {
    /// Defaults for the server at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session: SessionConfig::default(),
            persistent: defaults::persistent(),
            connect_timeout_ms: defaults::connect_timeout_ms(),
            max_message_size: defaults::max_message_size(),
            poll_timeout_ms: defaults::poll_timeout_ms(),
            send_timeout_ms: defaults::send_timeout_ms(),
            reconnect_timeout_ms: defaults::reconnect_timeout_ms(),
        }
    }

    /// Derive the server endpoints.
    pub fn endpoints(&self) -> Result<Endpoints, EndpointError> {
        Endpoints::from_base(&self.base_url)
    }

    /// Persistent transport options for `endpoints`.
    #[must_use]
    pub fn websocket_options(&self, endpoints: &Endpoints) -> WebSocketOptions {
        let mut options = WebSocketOptions::new(endpoints.websocket.clone());
        options.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        options.max_message_size = self.max_message_size;
        options
    }

    /// Polling transport options for `endpoints`.
    #[must_use]
    pub fn long_poll_options(&self, endpoints: &Endpoints) -> LongPollOptions {
        let mut options = LongPollOptions::new(endpoints.send.clone(), endpoints.poll.clone());
        options.poll_timeout = Duration::from_millis(self.poll_timeout_ms);
        options.send_timeout = Duration::from_millis(self.send_timeout_ms);
        options
    }

    /// Reconnect request deadline.
    #[must_use]
    pub const fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
mod defaults {
    use super::{
        DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_TIMEOUT, DEFAULT_RECONNECT_TIMEOUT,
        DEFAULT_SEND_TIMEOUT, MAX_MESSAGE_SIZE,
    };

    pub(super) const fn persistent() -> bool {
        true
    }

    pub(super) const fn connect_timeout_ms() -> u64 {
        DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
    }

    pub(super) const fn max_message_size() -> usize {
        MAX_MESSAGE_SIZE
    }

    pub(super) const fn poll_timeout_ms() -> u64 {
        DEFAULT_POLL_TIMEOUT.as_millis() as u64
    }

    pub(super) const fn send_timeout_ms() -> u64 {
        DEFAULT_SEND_TIMEOUT.as_millis() as u64
    }

    pub(super) const fn reconnect_timeout_ms() -> u64 {
        DEFAULT_RECONNECT_TIMEOUT.as_millis() as u64
    }
}
