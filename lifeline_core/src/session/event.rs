//! Notifications delivered to the application.

use crate::error::SessionError;

/// Something the application should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The first handshake of this session succeeded. Fired once.
    Ready,

    /// A later handshake succeeded after a reconnect.
    Reconnected,

    /// An application payload arrived.
    Message(String),

    /// The server asked for a full reload instead of a reconnect.
    ReloadRequested,

    /// Something went wrong. See [`SessionError`] for which errors are final.
    Error(SessionError),
}
