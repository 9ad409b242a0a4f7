//! # Lifeline HTTP long-poll transport
//!
//! The polling [`Transport`](lifeline_core::transport::Transport) and the
//! HTTP client for the out-of-band reconnect endpoint.
//!
//! # Wire format
//!
//! ```text
//! POST <send_url>   init                  ──►  <uid>&<pollToken>
//! POST <poll_url>   <uid>&<pollToken>     ──►  <nextPollToken>&<frame>   (held open)
//! POST <send_url>   <uid>&<frame>         ──►  (ignored)
//! POST <reconnect>  id=<instanceId>       ──►  <sessionId>&<accessToken> | refresh
//! ```
//!
//! The poll token is private to the transport. It is split off every poll
//! response before the rest is handed to the session, and exactly one poll
//! request is outstanding while the transport is open.

pub mod error;
pub mod http_client;
pub mod reconnect;
pub mod transport;

use core::time::Duration;

use url::Url;

pub use http_client::{HttpClient, HttpResponse};
pub use reconnect::HttpReconnectClient;
pub use transport::LongPollTransport;

#[cfg(feature = "reqwest")]
pub use http_client::reqwest_client::ReqwestHttpClient;

/// Body of the request that opens a polling session.
pub const INIT_BODY: &str = "init";

/// Default deadline for a held poll request.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(45);

/// Default deadline for send and init requests.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(7);

/// Default deadline for a reconnect request.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(7);

pub(crate) const TEXT_HEADERS: &[(&str, &str)] = &[("content-type", "text/plain; charset=utf-8")];

/// Endpoints and deadlines for the polling transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPollOptions {
    /// Receives `init` and outbound frames.
    pub send_url: Url,

    /// Holds poll requests open until data is available.
    pub poll_url: Url,

    /// Deadline for one poll request.
    pub poll_timeout: Duration,

    /// Deadline for one send or init request.
    pub send_timeout: Duration,
}

impl LongPollOptions {
    /// Options with default deadlines.
    #[must_use]
    pub fn new(send_url: Url, poll_url: Url) -> Self {
        Self {
            send_url,
            poll_url,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}
