//! Session lifecycle states and status snapshots.

use crate::{id::InstanceId, transport::TransportKind};

/// Where the session is in its lifecycle.
///
/// ```text
/// Idle ─► Connecting ─► Handshaking ─► Ready
///              ▲                         │ close / error / silence + send
///              └──────── Reconnecting ◄──┘
///                             │ budget exceeded / framing error
///                             ▼
///                           Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SessionState {
    /// No session, or the server asked for a reload.
    #[default]
    Idle,

    /// A transport is being set up.
    Connecting,

    /// The handshake frame was sent and its reply is awaited.
    Handshaking,

    /// Frames flow in both directions.
    Ready,

    /// Waiting for a retry after a failure.
    Reconnecting,

    /// Gave up. Needs a manual reconnect or reload.
    Failed,
}

/// A point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatus {
    /// Lifecycle state.
    pub state: SessionState,

    /// Consecutive failures since the last successful handshake.
    pub reconnect_count: u32,

    /// Whether the health monitor considers the connection lost.
    pub connection_lost: bool,

    /// Kind of the transport currently in use.
    pub transport: Option<TransportKind>,

    /// Whether subsequent attempts are forced onto polling.
    pub fallback_engaged: bool,

    /// Instance from the last successful handshake.
    pub instance_id: Option<InstanceId>,
}
