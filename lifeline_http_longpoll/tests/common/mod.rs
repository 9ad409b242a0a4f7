#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};

use futures::{channel::oneshot, future::BoxFuture, FutureExt};
use lifeline_http_longpoll::{HttpClient, HttpResponse};
use thiserror::Error;

static TRACING: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .init();
    });
}

#[derive(Debug, Clone, Copy, Error)]
#[error("connection refused")]
pub struct Refused;

/// One request seen by [`ScriptedHttp`], waiting for the test to answer it.
#[derive(Debug)]
pub struct PendingRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    respond: oneshot::Sender<Result<HttpResponse, Refused>>,
}

impl PendingRequest {
    pub fn reply(self, resp: HttpResponse) {
        let _ = self.respond.send(Ok(resp));
    }

    pub fn reply_ok(self, body: &str) {
        self.reply(HttpResponse::ok(body));
    }

    pub fn refuse(self) {
        let _ = self.respond.send(Err(Refused));
    }

    pub fn is_poll(&self) -> bool {
        self.url.ends_with("/poll")
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An [`HttpClient`] whose responses are supplied by the test.
#[derive(Clone)]
pub struct ScriptedHttp {
    requests_tx: async_channel::Sender<PendingRequest>,
    requests: async_channel::Receiver<PendingRequest>,
    in_flight_polls: Arc<AtomicUsize>,
    max_in_flight_polls: Arc<AtomicUsize>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        let (requests_tx, requests) = async_channel::unbounded();
        Self {
            requests_tx,
            requests,
            in_flight_polls: Arc::new(AtomicUsize::new(0)),
            max_in_flight_polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn next_request(&self) -> PendingRequest {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("request within deadline")
            .expect("client alive")
    }

    pub fn try_next_request(&self) -> Option<PendingRequest> {
        self.requests.try_recv().ok()
    }

    pub fn in_flight_polls(&self) -> usize {
        self.in_flight_polls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight_polls(&self) -> usize {
        self.max_in_flight_polls.load(Ordering::SeqCst)
    }
}

impl HttpClient for ScriptedHttp {
    type Error = Refused;

    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> BoxFuture<'static, Result<HttpResponse, Self::Error>> {
        let (respond, rx) = oneshot::channel();
        let guard = url.ends_with("/poll").then(|| {
            let guard = InFlight::new(&self.in_flight_polls);
            self.max_in_flight_polls
                .fetch_max(self.in_flight_polls.load(Ordering::SeqCst), Ordering::SeqCst);
            guard
        });

        let _ = self.requests_tx.try_send(PendingRequest {
            url: url.to_owned(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body: String::from_utf8(body).expect("utf-8 body"),
            respond,
        });

        async move {
            let _guard = guard;
            rx.await.unwrap_or(Err(Refused))
        }
        .boxed()
    }
}
