//! [`Transport`] over HTTP long-poll.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   LongPollTransport                      │
//! │                                                          │
//! │  open() ──► init task ── POST init ──► uid, pollToken    │
//! │                 │                                        │
//! │                 ├──► poll loop ── POST uid&token ──┐     │
//! │                 │        ▲                         │     │
//! │                 │        └── issue next, then emit ┘     │
//! │                 │                                        │
//! │  send(frame) ──► outbound_tx ──► send task ── POST ───►  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failed, timed-out or malformed request aborts every task and emits a
//! single [`TransportEvent::Error`]. [`reset`](Transport::reset) aborts every
//! task silently.

use core::time::Duration;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, OnceLock, PoisonError,
};

use futures::{
    future::{AbortHandle, BoxFuture},
    FutureExt,
};
use lifeline_core::{
    error::TransportSendError,
    frame::DELIMITER,
    spawn::Spawn,
    timeout::Timeout,
    transport::{EventSink, Transport, TransportEvent, TransportKind},
};

use crate::{
    error::TransportError,
    http_client::{HttpClient, HttpResponse},
    LongPollOptions, INIT_BODY, TEXT_HEADERS,
};

type PendingResponse<E> = BoxFuture<'static, Result<HttpResponse, E>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Tasks {
    closed: bool,
    init: Option<AbortHandle>,
    poll: Option<AbortHandle>,
    send: Option<AbortHandle>,
}

impl Tasks {
    fn abort_all(&mut self) {
        self.closed = true;
        for handle in [self.init.take(), self.poll.take(), self.send.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

#[derive(Debug)]
struct Inner<H, S, O> {
    options: LongPollOptions,
    http: H,
    spawner: S,
    timeout: O,
    sink: EventSink,
    uid: OnceLock<String>,
    opened: AtomicBool,
    tasks: Mutex<Tasks>,
}

/// The polling transport.
#[derive(Debug)]
pub struct LongPollTransport<H, S, O> {
    inner: Arc<Inner<H, S, O>>,
    outbound: Option<async_channel::Sender<String>>,
    started: bool,
}

impl<H, S, O> LongPollTransport<H, S, O> {
    /// Create an idle transport that reports into `sink`.
    #[must_use]
    pub fn new(options: LongPollOptions, http: H, spawner: S, timeout: O, sink: EventSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                http,
                spawner,
                timeout,
                sink,
                uid: OnceLock::new(),
                opened: AtomicBool::new(false),
                tasks: Mutex::new(Tasks::default()),
            }),
            outbound: None,
            started: false,
        }
    }

    /// The id assigned by the server, once open.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.inner.uid.get().map(String::as_str)
    }
}

impl<H, S, O> Transport for LongPollTransport<H, S, O>
where
    H: HttpClient,
    S: Spawn + Send + Sync + 'static,
    O: Timeout,
{
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    fn open(&mut self) {
        if self.started {
            tracing::warn!(transport_id = %self.inner.sink.id(), "open called twice");
            return;
        }
        self.started = true;

        let (tx, rx) = async_channel::unbounded();
        self.outbound = Some(tx);

        let inner = self.inner.clone();
        let mut tasks = lock(&self.inner.tasks);
        if tasks.closed {
            return;
        }
        tasks.init = Some(self.inner.spawner.spawn(inner.init(rx).boxed()));
    }

    fn send(&mut self, frame: String) -> Result<(), TransportSendError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(if self.started {
                TransportSendError::Closed
            } else {
                TransportSendError::NotOpen
            });
        };
        if lock(&self.inner.tasks).closed {
            return Err(TransportSendError::Closed);
        }
        if !self.inner.opened.load(Ordering::SeqCst) {
            return Err(TransportSendError::NotOpen);
        }
        outbound
            .try_send(frame)
            .map_err(|_| TransportSendError::Closed)
    }

    fn reset(&mut self) {
        self.inner.sink.detach();
        lock(&self.inner.tasks).abort_all();
        self.inner.opened.store(false, Ordering::SeqCst);
        self.outbound = None;
        self.started = true;
    }
}

impl<H, S, O> Drop for LongPollTransport<H, S, O> {
    fn drop(&mut self) {
        self.inner.sink.detach();
        lock(&self.inner.tasks).abort_all();
    }
}

impl<H, S, O> Inner<H, S, O>
where
    H: HttpClient,
    S: Spawn + Send + Sync + 'static,
    O: Timeout,
{
    async fn init(self: Arc<Self>, outbound: async_channel::Receiver<String>) {
        let request = self.http.post(
            self.options.send_url.as_str(),
            TEXT_HEADERS,
            INIT_BODY.as_bytes().to_vec(),
        );

        let body = match self.complete(self.options.send_timeout, request).await {
            Ok(resp) => resp.text(),
            Err(e) => return self.fail(&e),
        };

        let Some((uid, poll_token)) = body.split_once(DELIMITER) else {
            return self.fail(&TransportError::MissingDelimiter(body.clone()));
        };
        let _ = self.uid.set(uid.to_owned());
        tracing::debug!(transport_id = %self.sink.id(), uid, "polling session opened");

        {
            let mut tasks = lock(&self.tasks);
            if tasks.closed {
                return;
            }
            let sender = self.clone();
            tasks.send = Some(self.spawner.spawn(sender.send_loop(outbound).boxed()));
        }

        // Open goes out before any polled frame can.
        self.opened.store(true, Ordering::SeqCst);
        self.sink.emit(TransportEvent::Open);

        let mut tasks = lock(&self.tasks);
        if tasks.closed {
            return;
        }
        let poller = self.clone();
        tasks.poll = Some(self.spawner.spawn(poller.poll_loop(poll_token.to_owned()).boxed()));
    }

    /// Hold exactly one poll request open until the transport closes.
    ///
    /// Request N+1 is issued before frame N is delivered, and frames are
    /// delivered from this one task, so they arrive in server order.
    async fn poll_loop(self: Arc<Self>, mut token: String) {
        let Some(mut request) = self.poll_request(&token) else {
            return;
        };

        loop {
            let resp = match self.complete(self.options.poll_timeout, request).await {
                Ok(resp) => resp,
                Err(e) => return self.fail(&e),
            };

            if resp.status == 204 || resp.body.is_empty() {
                tracing::trace!(transport_id = %self.sink.id(), "empty poll response");
                let Some(next) = self.poll_request(&token) else {
                    return;
                };
                request = next;
                continue;
            }

            let body = resp.text();
            let Some((next_token, frame)) = body.split_once(DELIMITER) else {
                return self.fail(&TransportError::MissingDelimiter(body.clone()));
            };

            token = next_token.to_owned();
            let Some(next) = self.poll_request(&token) else {
                return;
            };
            request = next;

            if !frame.is_empty() {
                self.sink.emit(TransportEvent::Message(frame.to_owned()));
            }
        }
    }

    /// Issue a poll request, unless the transport has closed.
    fn poll_request(&self, token: &str) -> Option<PendingResponse<H::Error>> {
        let tasks = lock(&self.tasks);
        if tasks.closed {
            return None;
        }
        let uid = self.uid.get().map_or("", String::as_str);
        Some(self.http.post(
            self.options.poll_url.as_str(),
            TEXT_HEADERS,
            format!("{uid}{DELIMITER}{token}").into_bytes(),
        ))
    }

    async fn send_loop(self: Arc<Self>, outbound: async_channel::Receiver<String>) {
        let uid = self.uid.get().cloned().unwrap_or_default();

        while let Ok(frame) = outbound.recv().await {
            let request = self.http.post(
                self.options.send_url.as_str(),
                TEXT_HEADERS,
                format!("{uid}{DELIMITER}{frame}").into_bytes(),
            );
            if let Err(e) = self.complete(self.options.send_timeout, request).await {
                return self.fail(&e);
            }
        }

        tracing::debug!(transport_id = %self.sink.id(), "outbound channel closed");
    }

    async fn complete(
        &self,
        deadline: Duration,
        request: PendingResponse<H::Error>,
    ) -> Result<HttpResponse, TransportError> {
        let resp = self
            .timeout
            .timeout(deadline, request)
            .await?
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if resp.is_success() {
            Ok(resp)
        } else {
            Err(TransportError::UnexpectedStatus {
                status: resp.status,
            })
        }
    }

    fn fail(&self, error: &TransportError) {
        {
            let mut tasks = lock(&self.tasks);
            if tasks.closed {
                return;
            }
            tasks.abort_all();
        }
        self.opened.store(false, Ordering::SeqCst);
        tracing::warn!(transport_id = %self.sink.id(), error = %error, "polling transport failed");
        self.sink.emit(TransportEvent::Error);
    }
}
