//! Scriptable collaborators for driving a [`SessionManager`] in tests.
//!
//! [`SessionManager`]: crate::session::SessionManager

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{future::BoxFuture, FutureExt};
use thiserror::Error;

use crate::{
    error::TransportSendError,
    id::{InstanceId, TransportId},
    presenter::{FatalNotice, Presenter},
    reconnect::{ReconnectClient, ReconnectReply},
    transport::{EventSink, Transport, TransportEvent, TransportFactory, TransportKind},
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Let every ready task run without advancing the clock.
pub async fn flush() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug)]
struct MockTransportState {
    kind: TransportKind,
    sink: EventSink,
    open_calls: usize,
    opened: bool,
    closed: bool,
    resets: usize,
    sent: Vec<String>,
}

/// Test-side view of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransportHandle {
    /// The transport's id.
    #[must_use]
    pub fn id(&self) -> TransportId {
        lock(&self.state).sink.id()
    }

    /// Which kind was requested from the factory.
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        lock(&self.state).kind
    }

    /// How many times `open()` was called.
    #[must_use]
    pub fn open_calls(&self) -> usize {
        lock(&self.state).open_calls
    }

    /// How many times `reset()` was called.
    #[must_use]
    pub fn resets(&self) -> usize {
        lock(&self.state).resets
    }

    /// Frames accepted by `send()`, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    /// The most recently accepted frame.
    #[must_use]
    pub fn last_sent(&self) -> Option<String> {
        lock(&self.state).sent.last().cloned()
    }

    /// Whether the sink has been detached by the session.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        lock(&self.state).sink.is_detached()
    }

    /// Report the connection as open.
    pub fn fire_open(&self) -> bool {
        let mut state = lock(&self.state);
        state.opened = true;
        state.sink.emit(TransportEvent::Open)
    }

    /// Deliver an inbound frame.
    pub fn fire_message(&self, data: &str) -> bool {
        lock(&self.state)
            .sink
            .emit(TransportEvent::Message(data.to_owned()))
    }

    /// Report the connection as closed.
    pub fn fire_close(&self) -> bool {
        let mut state = lock(&self.state);
        state.closed = true;
        state.sink.emit(TransportEvent::Close)
    }

    /// Report the connection as failed.
    pub fn fire_error(&self) -> bool {
        let mut state = lock(&self.state);
        state.closed = true;
        state.sink.emit(TransportEvent::Error)
    }

    /// Push an event past the detach flag, as a misbehaving transport would.
    pub fn fire_unchecked(&self, event: TransportEvent) -> bool {
        lock(&self.state).sink.emit_unchecked(event)
    }
}

/// A [`Transport`] whose events are fired by hand.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        lock(&self.state).kind
    }

    fn open(&mut self) {
        lock(&self.state).open_calls += 1;
    }

    fn send(&mut self, frame: String) -> Result<(), TransportSendError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportSendError::Closed);
        }
        if !state.opened {
            return Err(TransportSendError::NotOpen);
        }
        state.sent.push(frame);
        Ok(())
    }

    fn reset(&mut self) {
        let mut state = lock(&self.state);
        state.resets += 1;
        state.closed = true;
        state.sink.detach();
    }
}

/// A [`TransportFactory`] that records every transport it builds.
#[derive(Debug, Clone)]
pub struct MockTransportFactory {
    supports_persistent: bool,
    created: Arc<Mutex<Vec<MockTransportHandle>>>,
}

impl MockTransportFactory {
    /// A factory that can build both kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_persistent_support(true)
    }

    /// A factory that may lack persistent support.
    #[must_use]
    pub fn with_persistent_support(supports_persistent: bool) -> Self {
        Self {
            supports_persistent,
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every transport built so far, oldest first.
    #[must_use]
    pub fn created(&self) -> Vec<MockTransportHandle> {
        lock(&self.created).clone()
    }

    /// Number of transports built so far.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.created).len()
    }

    /// The most recently built transport.
    #[must_use]
    pub fn last(&self) -> Option<MockTransportHandle> {
        lock(&self.created).last().cloned()
    }
}

impl Default for MockTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for MockTransportFactory {
    fn supports_persistent(&self) -> bool {
        self.supports_persistent
    }

    fn create(&self, kind: TransportKind, sink: EventSink) -> Box<dyn Transport> {
        let state = Arc::new(Mutex::new(MockTransportState {
            kind,
            sink,
            open_calls: 0,
            opened: false,
            closed: false,
            resets: 0,
            sent: Vec::new(),
        }));
        lock(&self.created).push(MockTransportHandle {
            state: state.clone(),
        });
        Box::new(MockTransport { state })
    }
}

/// Something a [`RecordingPresenter`] was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    /// `show_connection_lost`
    ConnectionLost,
    /// `hide_connection_lost`
    ConnectionRestored,
    /// `show_fatal_error`
    Fatal(FatalNotice),
    /// `reconnect_failed`
    ReconnectFailed,
    /// `reconnect_succeeded`
    ReconnectSucceeded,
}

/// A [`Presenter`] that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    shown: Arc<Mutex<Vec<Shown>>>,
}

impl RecordingPresenter {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first.
    #[must_use]
    pub fn shown(&self) -> Vec<Shown> {
        lock(&self.shown).clone()
    }

    /// How many times `what` was recorded.
    #[must_use]
    pub fn count(&self, what: &Shown) -> usize {
        lock(&self.shown).iter().filter(|s| *s == what).count()
    }

    /// The most recent fatal notice.
    #[must_use]
    pub fn last_fatal(&self) -> Option<FatalNotice> {
        lock(&self.shown).iter().rev().find_map(|s| match s {
            Shown::Fatal(notice) => Some(notice.clone()),
            _ => None,
        })
    }

    fn record(&self, what: Shown) {
        lock(&self.shown).push(what);
    }
}

impl Presenter for RecordingPresenter {
    fn show_connection_lost(&self) {
        self.record(Shown::ConnectionLost);
    }

    fn hide_connection_lost(&self) {
        self.record(Shown::ConnectionRestored);
    }

    fn show_fatal_error(&self, notice: &FatalNotice) {
        self.record(Shown::Fatal(notice.clone()));
    }

    fn reconnect_failed(&self) {
        self.record(Shown::ReconnectFailed);
    }

    fn reconnect_succeeded(&self) {
        self.record(Shown::ReconnectSucceeded);
    }
}

/// The scripted reconnect endpoint was unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reconnect endpoint unreachable")]
pub struct Unreachable;

/// A [`ReconnectClient`] that replays queued replies.
///
/// With nothing queued, requests stay pending forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReconnectClient {
    replies: Arc<Mutex<VecDeque<Result<ReconnectReply, Unreachable>>>>,
    requests: Arc<Mutex<Vec<InstanceId>>>,
}

impl ScriptedReconnectClient {
    /// Create a client with no queued replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue fresh credentials.
    pub fn push_credentials(&self, session_id: &str, access_token: &str) {
        self.push(Ok(ReconnectReply::Credentials {
            session_id: session_id.into(),
            access_token: access_token.into(),
        }));
    }

    /// Queue a reload instruction.
    pub fn push_refresh(&self) {
        self.push(Ok(ReconnectReply::Refresh));
    }

    /// Queue a network failure.
    pub fn push_failure(&self) {
        self.push(Err(Unreachable));
    }

    /// Queue an arbitrary reply.
    pub fn push(&self, reply: Result<ReconnectReply, Unreachable>) {
        lock(&self.replies).push_back(reply);
    }

    /// Instance ids of every request made, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<InstanceId> {
        lock(&self.requests).clone()
    }
}

impl ReconnectClient for ScriptedReconnectClient {
    type Error = Unreachable;

    fn reconnect(
        &self,
        instance_id: &InstanceId,
    ) -> BoxFuture<'static, Result<ReconnectReply, Self::Error>> {
        lock(&self.requests).push(instance_id.clone());
        match lock(&self.replies).pop_front() {
            Some(reply) => async move { reply }.boxed(),
            None => futures::future::pending().boxed(),
        }
    }
}
