//! The transport contract.
//!
//! A [`Transport`] opens one underlying channel, carries opaque text frames,
//! and reports back through the [`EventSink`] it was constructed with:
//!
//! ```text
//!  constructed ──open()──► connecting ──Open──► steady ──Close/Error──► done
//!       ▲                                                                 │
//!       └────────────────────────── reset() ◄───────── (any state) ◄──────┘
//! ```
//!
//! A fresh transport is built for every connection attempt.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{error::TransportSendError, id::TransportId};

/// Which flavour of transport is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransportKind {
    /// A single long-lived full-duplex connection.
    Persistent,

    /// Long-poll requests paired with discrete send requests.
    Polling,
}

impl TransportKind {
    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportKind::Persistent => "persistent",
            TransportKind::Polling => "polling",
        }
    }
}

impl core::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is ready for [`Transport::send`].
    Open,

    /// A frame arrived, verbatim.
    Message(String),

    /// The channel closed. Terminal.
    Close,

    /// The channel failed. Terminal.
    Error,
}

impl TransportEvent {
    /// Whether no further events follow this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Close | TransportEvent::Error)
    }
}

/// Where a transport reports its events.
///
/// Each sink is bound to one [`TransportId`]. Once detached, explicitly or by
/// emitting a terminal event, it drops everything.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: TransportId,
    tx: async_channel::Sender<(TransportId, TransportEvent)>,
    detached: Arc<AtomicBool>,
}

impl EventSink {
    /// Create a sink for the transport `id` reporting into `tx`.
    #[must_use]
    pub fn new(id: TransportId, tx: async_channel::Sender<(TransportId, TransportEvent)>) -> Self {
        Self {
            id,
            tx,
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The transport this sink belongs to.
    #[must_use]
    pub const fn id(&self) -> TransportId {
        self.id
    }

    /// Report an event. Returns `false` if it was dropped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let dropped = if event.is_terminal() {
            self.detached.swap(true, Ordering::SeqCst)
        } else {
            self.detached.load(Ordering::SeqCst)
        };

        if dropped {
            tracing::trace!(
                transport_id = %self.id,
                ?event,
                "dropping event from detached transport"
            );
            return false;
        }

        self.tx.try_send((self.id, event)).is_ok()
    }

    /// Stop delivering events.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    /// Whether the sink has been detached.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub(crate) fn emit_unchecked(&self, event: TransportEvent) -> bool {
        self.tx.try_send((self.id, event)).is_ok()
    }
}

/// A connection that carries session frames.
///
/// Implementations must eventually emit exactly one of
/// [`TransportEvent::Open`] or a terminal event after [`open`](Self::open),
/// and must not emit anything once [`reset`](Self::reset) has returned.
pub trait Transport: Send {
    /// Which flavour this is.
    fn kind(&self) -> TransportKind;

    /// Begin connecting. Completion is reported through the sink.
    fn open(&mut self);

    /// Hand one frame to the channel.
    ///
    /// # Errors
    ///
    /// [`TransportSendError::NotOpen`] before the transport opened and
    /// [`TransportSendError::Closed`] after it closed, failed, or was reset.
    fn send(&mut self, frame: String) -> Result<(), TransportSendError>;

    /// Tear down immediately. Idempotent.
    fn reset(&mut self);
}

/// Builds transports on demand.
pub trait TransportFactory: Send + 'static {
    /// Whether a [`TransportKind::Persistent`] transport can be built here.
    fn supports_persistent(&self) -> bool;

    /// Build an idle transport of the given kind.
    fn create(&self, kind: TransportKind, sink: EventSink) -> Box<dyn Transport>;
}
