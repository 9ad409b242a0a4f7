//! The out-of-band reconnect request.
//!
//! Once the single-use access token has been presented it cannot be replayed.
//! Reconnecting instead asks the server, keyed by the last [`InstanceId`],
//! for fresh credentials or for a full reload.

use futures::future::BoxFuture;

use crate::id::{AccessToken, InstanceId, SessionId};

/// The server's answer to a reconnect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectReply {
    /// Fresh credentials for a new `init` cycle.
    Credentials {
        /// Session id to present.
        session_id: SessionId,

        /// Single-use token to present.
        access_token: AccessToken,
    },

    /// The client must reload from scratch.
    Refresh,
}

/// Issues reconnect requests.
pub trait ReconnectClient: Clone + Send + Sync + 'static {
    /// The error type for failed requests.
    type Error: core::error::Error + Send + 'static;

    /// Ask the server to resume the session last served by `instance_id`.
    fn reconnect(
        &self,
        instance_id: &InstanceId,
    ) -> BoxFuture<'static, Result<ReconnectReply, Self::Error>>;
}
