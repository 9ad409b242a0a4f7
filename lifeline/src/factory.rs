//! The [`TransportFactory`] that builds real transports.

use lifeline_core::{
    spawn::Spawn,
    timeout::Timeout,
    transport::{EventSink, Transport, TransportFactory, TransportKind},
};
use lifeline_http_longpoll::{HttpClient, LongPollOptions, LongPollTransport};
use lifeline_websocket::{WebSocketOptions, WebSocketTransport};

/// Builds [`WebSocketTransport`]s and [`LongPollTransport`]s.
///
/// Without WebSocket options the factory reports no persistent support and
/// the session runs on polling from the start.
#[derive(Debug, Clone)]
pub struct StandardTransportFactory<H, S, O> {
    websocket: Option<WebSocketOptions>,
    long_poll: LongPollOptions,
    http: H,
    spawner: S,
    timeout: O,
}

impl<H, S, O> StandardTransportFactory<H, S, O> {
    /// A factory for both transports.
    #[must_use]
    pub const fn new(
        websocket: WebSocketOptions,
        long_poll: LongPollOptions,
        http: H,
        spawner: S,
        timeout: O,
    ) -> Self {
        Self {
            websocket: Some(websocket),
            long_poll,
            http,
            spawner,
            timeout,
        }
    }

    /// A factory that only builds polling transports.
    #[must_use]
    pub const fn polling_only(long_poll: LongPollOptions, http: H, spawner: S, timeout: O) -> Self {
        Self {
            websocket: None,
            long_poll,
            http,
            spawner,
            timeout,
        }
    }
}

impl<H, S, O> TransportFactory for StandardTransportFactory<H, S, O>
where
    H: HttpClient,
    S: Spawn + Clone + Send + Sync + 'static,
    O: Timeout,
{
    fn supports_persistent(&self) -> bool {
        self.websocket.is_some()
    }

    fn create(&self, kind: TransportKind, sink: EventSink) -> Box<dyn Transport> {
        tracing::debug!(transport_id = %sink.id(), %kind, "building transport");
        match (kind, &self.websocket) {
            (TransportKind::Persistent, Some(options)) => Box::new(WebSocketTransport::new(
                options.clone(),
                self.spawner.clone(),
                self.timeout.clone(),
                sink,
            )),
            (TransportKind::Persistent, None) => {
                tracing::warn!("persistent transport unavailable; building a polling one");
                self.polling(sink)
            }
            (TransportKind::Polling, _) => self.polling(sink),
        }
    }
}

impl<H, S, O> StandardTransportFactory<H, S, O>
where
    H: HttpClient,
    S: Spawn + Clone + Send + Sync + 'static,
    O: Timeout,
{
    fn polling(&self, sink: EventSink) -> Box<dyn Transport> {
        Box::new(LongPollTransport::new(
            self.long_poll.clone(),
            self.http.clone(),
            self.spawner.clone(),
            self.timeout.clone(),
            sink,
        ))
    }
}
