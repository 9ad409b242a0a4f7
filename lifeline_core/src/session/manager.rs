//! The session actor.
//!
//! # Protocol
//!
//! ```text
//! Client                                   Server
//!   │ ── open transport ──────────────────► │
//!   │ ── sid=S&tok=T& ────────────────────► │   handshake (token now spent)
//!   │ ◄─────────────────────────── I&K0 ─── │   instance id + first token
//!   │ ── sid=S&tok=K0&tsk=...& ───────────► │
//!   │ ◄───────────────────────── K1&... ─── │   every frame rotates the token
//!   │ ◄─────────────────────── K2&ping ──── │
//!   │ ── sid=S&tok=K2&tsk=pong& ──────────► │
//! ```
//!
//! # Failures
//!
//! A transport close or error, a bad handshake reply, a failed send, or a
//! failed reconnect request all count as one failed attempt. The attempt
//! counter resets on every successful handshake. When it reaches the retry
//! budget the next attempt is forced onto polling (sticky for the lifetime of
//! the manager); when it exceeds the budget the session gives up.
//!
//! Retries never replay the access token. They ask the reconnect endpoint,
//! keyed by the last [`InstanceId`], for fresh credentials.

use core::ops::ControlFlow;

use futures::{channel::oneshot, future::AbortHandle, FutureExt};
use tokio::sync::watch;

use super::{
    event::SessionEvent,
    handle::Session,
    state::{SessionState, SessionStatus},
};
use crate::{
    config::SessionConfig,
    error::SessionError,
    frame::{self, FrameError, Inbound},
    health::HealthMonitor,
    id::{AccessToken, ContinuationToken, InstanceId, SessionId, TransportId},
    presenter::{FatalNotice, Presenter},
    reconnect::{ReconnectClient, ReconnectReply},
    spawn::Spawn,
    timer::{TimerSlot, TimerTicket},
    transport::{EventSink, Transport, TransportEvent, TransportFactory, TransportKind},
};

/// Work for the session actor.
#[derive(Debug)]
pub(crate) enum Input {
    Init {
        session_id: SessionId,
        access_token: AccessToken,
        force_fallback: bool,
    },
    Send {
        task: String,
        fields: Vec<(String, String)>,
        reply: oneshot::Sender<bool>,
    },
    Reconnect,
    Close,
    SettleElapsed(TimerTicket),
    RetryElapsed(TimerTicket),
    SilenceElapsed(TimerTicket),
    ReconnectResolved {
        attempt: u64,
        manual: bool,
        result: Result<ReconnectReply, String>,
    },
}

struct ActiveTransport {
    id: TransportId,
    kind: TransportKind,
    sink: EventSink,
    transport: Box<dyn Transport>,
}

impl ActiveTransport {
    fn retire(&mut self) {
        self.sink.detach();
        self.transport.reset();
    }
}

/// Owns the session identity and exactly one transport at a time.
///
/// Build one with [`SessionManager::new`] and drive it with
/// [`run`](Self::run); talk to it through the returned [`Session`].
pub struct SessionManager<F, R, P, S> {
    config: SessionConfig,
    factory: F,
    reconnect_client: R,
    presenter: P,
    spawner: S,

    inbox: async_channel::Receiver<Input>,
    inbox_tx: async_channel::Sender<Input>,
    transport_events: async_channel::Receiver<(TransportId, TransportEvent)>,
    transport_events_tx: async_channel::Sender<(TransportId, TransportEvent)>,
    events: async_channel::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,

    state: SessionState,
    session_id: Option<SessionId>,
    access_token: Option<AccessToken>,
    credentials_spent: bool,
    instance_id: Option<InstanceId>,
    continuation: Option<ContinuationToken>,

    active: Option<ActiveTransport>,
    retired: Option<ActiveTransport>,
    pending_kind: Option<TransportKind>,
    last_kind: Option<TransportKind>,

    reconnect_count: u32,
    fallback_engaged: bool,
    ready_fired: bool,
    manual_pending: bool,

    health: HealthMonitor,
    settle_timer: TimerSlot,
    retry_timer: TimerSlot,
    reconnect_attempt: u64,
    reconnect_request: Option<AbortHandle>,
}

impl<F, R, P, S> core::fmt::Debug for SessionManager<F, R, P, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("instance_id", &self.instance_id)
            .field("reconnect_count", &self.reconnect_count)
            .field("fallback_engaged", &self.fallback_engaged)
            .finish_non_exhaustive()
    }
}

impl<F, R, P, S> SessionManager<F, R, P, S>
where
    F: TransportFactory,
    R: ReconnectClient,
    P: Presenter,
    S: Spawn + Send + 'static,
{
    /// Create a manager, its handle, and the stream of [`SessionEvent`]s.
    ///
    /// Nothing happens until [`run`](Self::run) is polled and
    /// [`Session::init`] is called.
    pub fn new(
        config: SessionConfig,
        factory: F,
        reconnect_client: R,
        presenter: P,
        spawner: S,
    ) -> (Session, Self, async_channel::Receiver<SessionEvent>) {
        let (inbox_tx, inbox) = async_channel::unbounded();
        let (transport_events_tx, transport_events) = async_channel::unbounded();
        let (events, events_rx) = async_channel::unbounded();
        let (status, status_rx) = watch::channel(SessionStatus::default());

        let manager = Self {
            health: HealthMonitor::new(config.silence_timeout()),
            config,
            factory,
            reconnect_client,
            presenter,
            spawner,

            inbox,
            inbox_tx: inbox_tx.clone(),
            transport_events,
            transport_events_tx,
            events,
            status,

            state: SessionState::Idle,
            session_id: None,
            access_token: None,
            credentials_spent: false,
            instance_id: None,
            continuation: None,

            active: None,
            retired: None,
            pending_kind: None,
            last_kind: None,

            reconnect_count: 0,
            fallback_engaged: false,
            ready_fired: false,
            manual_pending: false,

            settle_timer: TimerSlot::new(),
            retry_timer: TimerSlot::new(),
            reconnect_attempt: 0,
            reconnect_request: None,
        };

        (Session::new(inbox_tx, status_rx), manager, events_rx)
    }

    /// Process inputs until [`Session::close`] is called.
    pub async fn run(mut self) {
        enum Step {
            Input(Input),
            Transport(TransportId, TransportEvent),
            Stop,
        }

        let inbox = self.inbox.clone();
        let transport_events = self.transport_events.clone();
        self.publish();

        loop {
            let step = tokio::select! {
                input = inbox.recv() => input.map_or(Step::Stop, Step::Input),
                event = transport_events.recv() => {
                    event.map_or(Step::Stop, |(id, ev)| Step::Transport(id, ev))
                }
            };

            let flow = match step {
                Step::Input(input) => self.handle(input),
                Step::Transport(id, event) => {
                    self.on_transport_event(id, event);
                    ControlFlow::Continue(())
                }
                Step::Stop => ControlFlow::Break(()),
            };

            self.publish();
            if flow.is_break() {
                break;
            }
        }

        tracing::info!("session manager stopped");
    }

    fn handle(&mut self, input: Input) -> ControlFlow<()> {
        match input {
            Input::Init {
                session_id,
                access_token,
                force_fallback,
            } => self.init(session_id, access_token, force_fallback),
            Input::Send {
                task,
                fields,
                reply,
            } => {
                let sent = self.send(&task, &fields);
                let _ = reply.send(sent);
            }
            Input::Reconnect => self.manual_reconnect(),
            Input::Close => {
                self.teardown();
                self.state = SessionState::Idle;
                return ControlFlow::Break(());
            }
            Input::SettleElapsed(ticket) => {
                if self.settle_timer.take(ticket) {
                    self.open_pending();
                }
            }
            Input::RetryElapsed(ticket) => {
                if self.retry_timer.take(ticket) {
                    self.retry();
                }
            }
            Input::SilenceElapsed(ticket) => {
                if self.health.expire(ticket) {
                    self.presenter.show_connection_lost();
                }
            }
            Input::ReconnectResolved {
                attempt,
                manual,
                result,
            } => {
                if attempt == self.reconnect_attempt && self.reconnect_request.take().is_some() {
                    self.on_reconnect_reply(result, manual);
                } else {
                    tracing::debug!(attempt, "ignoring superseded reconnect reply");
                }
            }
        }
        ControlFlow::Continue(())
    }

    // ---- connection setup ---------------------------------------------------

    fn init(&mut self, session_id: SessionId, access_token: AccessToken, force_fallback: bool) {
        if session_id.is_empty() || access_token.is_empty() {
            tracing::warn!("ignoring init with an empty session id or access token");
            return;
        }

        tracing::info!(%session_id, force_fallback, "initialising session");

        self.session_id = Some(session_id);
        self.access_token = Some(access_token);
        self.credentials_spent = false;
        self.continuation = None;

        self.retry_timer.cancel();
        self.abort_reconnect_request();
        self.health.disarm();

        let persistent =
            self.factory.supports_persistent() && !force_fallback && !self.fallback_engaged;
        let kind = if persistent {
            TransportKind::Persistent
        } else {
            TransportKind::Polling
        };

        self.state = SessionState::Connecting;

        match self.active.take().or_else(|| self.retired.take()) {
            Some(mut previous) => {
                tracing::debug!(transport_id = %previous.id, "resetting previous transport");
                previous.retire();
                if let Some(mut other) = self.retired.take() {
                    other.retire();
                }
                self.pending_kind = Some(kind);
                self.settle_timer.schedule(
                    &self.spawner,
                    self.config.settle_delay(),
                    &self.inbox_tx,
                    Input::SettleElapsed,
                );
            }
            None => {
                self.settle_timer.cancel();
                self.pending_kind = None;
                self.open_transport(kind);
            }
        }
    }

    fn open_pending(&mut self) {
        if let Some(kind) = self.pending_kind.take() {
            if self.state == SessionState::Connecting {
                self.open_transport(kind);
            }
        }
    }

    fn open_transport(&mut self, kind: TransportKind) {
        let id = TransportId::generate();
        let sink = EventSink::new(id, self.transport_events_tx.clone());
        let mut transport = self.factory.create(kind, sink.clone());

        tracing::info!(transport_id = %id, %kind, "opening transport");
        transport.open();

        self.last_kind = Some(kind);
        self.active = Some(ActiveTransport {
            id,
            kind,
            sink,
            transport,
        });
    }

    // ---- transport events ---------------------------------------------------

    fn on_transport_event(&mut self, id: TransportId, event: TransportEvent) {
        let Some(active) = self.active.as_ref() else {
            tracing::debug!(transport_id = %id, ?event, "no active transport; dropping event");
            return;
        };
        if active.id != id {
            tracing::debug!(transport_id = %id, ?event, "dropping event from stale transport");
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(data) => match self.state {
                SessionState::Handshaking => self.on_handshake_reply(&data),
                SessionState::Ready => self.on_frame(&data),
                state => tracing::debug!(?state, "ignoring frame outside of a live session"),
            },
            TransportEvent::Close | TransportEvent::Error => {
                tracing::warn!(transport_id = %id, ?event, "transport went down");
                self.on_failure();
            }
        }
    }

    fn on_open(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        let (Some(session_id), Some(access_token)) = (&self.session_id, &self.access_token) else {
            return;
        };

        let handshake = frame::handshake(session_id, access_token);
        self.credentials_spent = true;
        self.state = SessionState::Handshaking;

        if !self.transmit(handshake) {
            self.on_failure();
        }
    }

    fn on_handshake_reply(&mut self, data: &str) {
        match frame::parse_handshake_reply(data) {
            Ok((instance_id, token)) => {
                tracing::info!(%instance_id, "handshake complete");
                self.instance_id = Some(instance_id);
                self.continuation = Some(token);
                self.reconnect_count = 0;
                self.state = SessionState::Ready;

                self.health
                    .frame_received(&self.spawner, &self.inbox_tx, Input::SilenceElapsed);
                self.presenter.hide_connection_lost();

                if core::mem::take(&mut self.manual_pending) {
                    self.presenter.reconnect_succeeded();
                }

                if self.ready_fired {
                    self.emit(SessionEvent::Reconnected);
                } else {
                    self.ready_fired = true;
                    self.emit(SessionEvent::Ready);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "handshake failed");
                self.emit(SessionEvent::Error(SessionError::Handshake(e)));
                self.on_failure();
            }
        }
    }

    fn on_frame(&mut self, data: &str) {
        match frame::parse_inbound(data) {
            Err(FrameError::Empty) => {}
            Err(_) => self.on_framing_error(data),
            Ok(Inbound::InvalidRequest) => {
                tracing::warn!("server rejected a request as invalid");
            }
            Ok(Inbound::Frame { token, remainder }) => {
                self.continuation = Some(token);

                if remainder == frame::PING {
                    let pong = match (&self.session_id, &self.continuation) {
                        (Some(sid), Some(token)) => frame::pong(sid, token),
                        _ => return,
                    };
                    if !self.transmit(pong) {
                        self.on_failure();
                        return;
                    }
                    self.touch_health();
                    return;
                }

                self.touch_health();
                if !remainder.is_empty() {
                    self.emit(SessionEvent::Message(remainder.to_owned()));
                }
            }
        }
    }

    fn on_framing_error(&mut self, data: &str) {
        tracing::error!(%data, "invalid data received from server");
        self.teardown();
        self.state = SessionState::Failed;
        self.presenter
            .show_fatal_error(&FatalNotice::invalid_data(data));
        self.emit(SessionEvent::Error(SessionError::Framing {
            data: data.to_owned(),
        }));
    }

    // ---- outbound -----------------------------------------------------------

    fn send(&mut self, task: &str, fields: &[(String, String)]) -> bool {
        if self.state != SessionState::Ready {
            tracing::debug!(state = ?self.state, task, "not ready; refusing to send");
            return false;
        }

        if self.health.is_lost() {
            tracing::info!(task, "connection lost; reconnecting instead of sending");
            self.on_failure();
            return false;
        }

        let frame = match (&self.session_id, &self.continuation) {
            (Some(sid), Some(token)) => frame::outbound(sid, token, task, fields),
            _ => return false,
        };

        if self.transmit(frame) {
            true
        } else {
            self.on_failure();
            false
        }
    }

    fn transmit(&mut self, frame: String) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        tracing::trace!(transport_id = %active.id, %frame, "sending frame");
        match active.transport.send(frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(transport_id = %active.id, error = %e, "transport refused frame");
                false
            }
        }
    }

    // ---- reconnection -------------------------------------------------------

    fn on_failure(&mut self) {
        if matches!(self.state, SessionState::Failed | SessionState::Idle) {
            return;
        }

        if let Some(mut active) = self.active.take() {
            active.retire();
            if let Some(mut older) = self.retired.replace(active) {
                older.retire();
            }
        }
        self.settle_timer.cancel();
        self.pending_kind = None;
        self.health.disarm();

        if core::mem::take(&mut self.manual_pending) {
            self.presenter.reconnect_failed();
        }
        self.presenter.show_connection_lost();

        self.state = SessionState::Reconnecting;
        self.reconnect_count += 1;
        let attempt = self.reconnect_count;
        let budget = self.config.retry_budget;

        if attempt == budget && self.last_kind != Some(TransportKind::Polling) {
            tracing::info!(attempt, "falling back to the polling transport");
            self.fallback_engaged = true;
        }

        if attempt > budget {
            self.give_up();
            return;
        }

        tracing::info!(attempt, budget, "scheduling reconnect");
        self.retry_timer.schedule(
            &self.spawner,
            self.config.retry_delay(),
            &self.inbox_tx,
            Input::RetryElapsed,
        );
    }

    fn retry(&mut self) {
        if self.state != SessionState::Reconnecting {
            return;
        }

        if let Some(instance_id) = self.instance_id.clone() {
            self.request_reconnect(&instance_id, false);
            return;
        }

        match (&self.session_id, &self.access_token) {
            (Some(sid), Some(token)) if !self.credentials_spent => {
                let (sid, token) = (sid.clone(), token.clone());
                self.init(sid, token, false);
            }
            _ => {
                tracing::warn!("no instance to reconnect and the access token is spent");
                self.give_up();
            }
        }
    }

    fn request_reconnect(&mut self, instance_id: &InstanceId, manual: bool) {
        self.abort_reconnect_request();
        self.reconnect_attempt += 1;
        let attempt = self.reconnect_attempt;

        tracing::info!(%instance_id, manual, "requesting reconnect");
        let request = self.reconnect_client.reconnect(instance_id);
        let tx = self.inbox_tx.clone();
        let handle = self.spawner.spawn(
            async move {
                let result = request.await.map_err(|e| e.to_string());
                let _ = tx
                    .send(Input::ReconnectResolved {
                        attempt,
                        manual,
                        result,
                    })
                    .await;
            }
            .boxed(),
        );
        self.reconnect_request = Some(handle);
    }

    fn on_reconnect_reply(&mut self, result: Result<ReconnectReply, String>, manual: bool) {
        match result {
            Ok(ReconnectReply::Credentials {
                session_id,
                access_token,
            }) => {
                tracing::info!(%session_id, "received fresh credentials");
                self.manual_pending = manual;
                self.init(session_id, access_token, false);
            }
            Ok(ReconnectReply::Refresh) => {
                tracing::info!("server requested a reload");
                self.teardown();
                self.state = SessionState::Idle;
                self.emit(SessionEvent::ReloadRequested);
            }
            Err(e) => {
                tracing::warn!(error = %e, "reconnect request failed");
                self.manual_pending = manual;
                self.on_failure();
            }
        }
    }

    fn manual_reconnect(&mut self) {
        match self.state {
            SessionState::Reconnecting | SessionState::Failed => {}
            SessionState::Ready if self.health.is_lost() => {}
            state => {
                tracing::debug!(?state, "manual reconnect not needed");
                return;
            }
        }

        let Some(instance_id) = self.instance_id.clone() else {
            tracing::warn!("manual reconnect without a known instance");
            self.presenter.reconnect_failed();
            return;
        };

        if self.state == SessionState::Failed {
            self.reconnect_count = 0;
        }

        self.retry_timer.cancel();
        if let Some(mut active) = self.active.take() {
            active.retire();
            if let Some(mut older) = self.retired.replace(active) {
                older.retire();
            }
        }
        self.health.disarm();
        self.state = SessionState::Reconnecting;
        self.request_reconnect(&instance_id, true);
    }

    fn give_up(&mut self) {
        tracing::error!(attempts = self.reconnect_count, "giving up on the connection");
        self.teardown();
        self.state = SessionState::Failed;
        self.presenter.show_fatal_error(&FatalNotice::cannot_connect());
        self.emit(SessionEvent::Error(SessionError::RetryBudgetExhausted {
            attempts: self.reconnect_count,
        }));
    }

    // ---- helpers ------------------------------------------------------------

    fn touch_health(&mut self) {
        if self
            .health
            .frame_received(&self.spawner, &self.inbox_tx, Input::SilenceElapsed)
        {
            self.presenter.hide_connection_lost();
        }
    }

    fn abort_reconnect_request(&mut self) {
        if let Some(handle) = self.reconnect_request.take() {
            handle.abort();
        }
    }

    fn teardown(&mut self) {
        for mut transport in [self.active.take(), self.retired.take()]
            .into_iter()
            .flatten()
        {
            transport.retire();
        }
        self.pending_kind = None;
        self.settle_timer.cancel();
        self.retry_timer.cancel();
        self.abort_reconnect_request();
        self.health.disarm();
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.try_send(event).is_err() {
            tracing::debug!("no one is listening for session events");
        }
    }

    fn publish(&self) {
        self.status.send_replace(SessionStatus {
            state: self.state,
            reconnect_count: self.reconnect_count,
            connection_lost: self.health.is_lost(),
            transport: self.active.as_ref().map(|a| a.kind),
            fallback_engaged: self.fallback_engaged,
            instance_id: self.instance_id.clone(),
        });
    }
}
