//! [`Transport`] over a single WebSocket.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_tungstenite::{
    tokio::{connect_async_with_config, ConnectStream},
    WebSocketStream,
};
use core::time::Duration;
use futures::{FutureExt, SinkExt, StreamExt};
use lifeline_core::{
    error::TransportSendError,
    spawn::Spawn,
    timeout::Timeout,
    transport::{EventSink, Transport, TransportEvent, TransportKind},
};
use tokio_util::sync::CancellationToken;
use tungstenite::{protocol::WebSocketConfig, Message};

use crate::{
    error::{ConnectError, RunError},
    WebSocketOptions,
};

/// How long a graceful close may take once the transport is reset.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// The persistent transport.
///
/// Frames handed to [`send`](Transport::send) are queued and written by the
/// connection task in order.
#[derive(Debug)]
pub struct WebSocketTransport<S, O> {
    options: WebSocketOptions,
    spawner: S,
    timeout: O,
    sink: EventSink,
    opened: Arc<AtomicBool>,
    cancel: CancellationToken,
    outbound: Option<async_channel::Sender<String>>,
    started: bool,
}

impl<S, O> WebSocketTransport<S, O> {
    /// Create an idle transport that reports into `sink`.
    #[must_use]
    pub fn new(options: WebSocketOptions, spawner: S, timeout: O, sink: EventSink) -> Self {
        Self {
            options,
            spawner,
            timeout,
            sink,
            opened: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            outbound: None,
            started: false,
        }
    }
}

impl<S, O> Transport for WebSocketTransport<S, O>
where
    S: Spawn + Send,
    O: Timeout,
{
    fn kind(&self) -> TransportKind {
        TransportKind::Persistent
    }

    fn open(&mut self) {
        if self.started {
            tracing::warn!(transport_id = %self.sink.id(), "open called twice");
            return;
        }
        self.started = true;

        let (tx, rx) = async_channel::unbounded();
        self.outbound = Some(tx);

        let task = ConnectionTask {
            options: self.options.clone(),
            timeout: self.timeout.clone(),
            sink: self.sink.clone(),
            opened: self.opened.clone(),
            cancel: self.cancel.clone(),
            outbound: rx,
        };
        self.spawner.spawn(task.run().boxed());
    }

    fn send(&mut self, frame: String) -> Result<(), TransportSendError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(if self.started {
                TransportSendError::Closed
            } else {
                TransportSendError::NotOpen
            });
        };
        if !self.opened.load(Ordering::SeqCst) {
            return Err(TransportSendError::NotOpen);
        }
        outbound
            .try_send(frame)
            .map_err(|_| TransportSendError::Closed)
    }

    fn reset(&mut self) {
        self.sink.detach();
        self.cancel.cancel();
        self.outbound = None;
        self.opened.store(false, Ordering::SeqCst);
        self.started = true;
    }
}

impl<S, O> Drop for WebSocketTransport<S, O> {
    fn drop(&mut self) {
        self.sink.detach();
        self.cancel.cancel();
    }
}

struct ConnectionTask<O> {
    options: WebSocketOptions,
    timeout: O,
    sink: EventSink,
    opened: Arc<AtomicBool>,
    cancel: CancellationToken,
    outbound: async_channel::Receiver<String>,
}

impl<O: Timeout> ConnectionTask<O> {
    async fn run(self) {
        let id = self.sink.id();

        let stream = tokio::select! {
            () = self.cancel.cancelled() => return,
            result = self.connect() => match result {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(transport_id = %id, error = %e, "WebSocket connect failed");
                    self.sink.emit(TransportEvent::Error);
                    return;
                }
            },
        };

        tracing::info!(transport_id = %id, url = %self.options.url, "WebSocket open");
        self.opened.store(true, Ordering::SeqCst);
        self.sink.emit(TransportEvent::Open);

        match self.pump(stream).await {
            Ok(()) => tracing::debug!(transport_id = %id, "WebSocket closed locally"),
            Err(RunError::ClosedByPeer) => {
                tracing::info!(transport_id = %id, "WebSocket closed by peer");
                self.opened.store(false, Ordering::SeqCst);
                self.sink.emit(TransportEvent::Close);
            }
            Err(e) => {
                tracing::warn!(transport_id = %id, error = %e, "WebSocket failed");
                self.opened.store(false, Ordering::SeqCst);
                self.sink.emit(TransportEvent::Error);
            }
        }
    }

    async fn connect(&self) -> Result<WebSocketStream<ConnectStream>, ConnectError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.options.max_message_size);

        let url = self.options.url.as_str().to_owned();
        let connect = async move { connect_async_with_config(url, Some(ws_config)).await }.boxed();
        let (stream, _resp) = self
            .timeout
            .timeout(self.options.connect_timeout, connect)
            .await??;
        Ok(stream)
    }

    async fn pump(&self, stream: WebSocketStream<ConnectStream>) -> Result<(), RunError> {
        let (mut writer, mut reader) = stream.split();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let close = writer.send(Message::Close(None)).boxed();
                    let _ = self.timeout.timeout(CLOSE_GRACE, close).await;
                    return Ok(());
                }
                frame = self.outbound.recv() => {
                    let Ok(frame) = frame else {
                        let _ = writer.send(Message::Close(None)).await;
                        return Ok(());
                    };
                    writer.send(Message::Text(frame)).await?;
                }
                incoming = reader.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        self.sink.emit(TransportEvent::Message(text));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::warn!(len = bytes.len(), "ignoring binary WebSocket message");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return Err(RunError::ClosedByPeer),
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }
}
