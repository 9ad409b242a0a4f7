#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::sync::OnceLock;

use lifeline_core::{
    session::{Session, SessionEvent, SessionManager},
    spawn::TokioSpawn,
    test_utils::{
        flush, MockTransportFactory, MockTransportHandle, RecordingPresenter,
        ScriptedReconnectClient,
    },
    SessionConfig,
};
use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

pub struct Harness {
    pub session: Session,
    pub events: async_channel::Receiver<SessionEvent>,
    pub factory: MockTransportFactory,
    pub presenter: RecordingPresenter,
    pub reconnect: ScriptedReconnectClient,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_factory(MockTransportFactory::new())
    }

    pub fn with_factory(factory: MockTransportFactory) -> Self {
        init_tracing();
        let presenter = RecordingPresenter::new();
        let reconnect = ScriptedReconnectClient::new();
        let (session, manager, events) = SessionManager::new(
            SessionConfig::default(),
            factory.clone(),
            reconnect.clone(),
            presenter.clone(),
            TokioSpawn,
        );
        tokio::spawn(manager.run());

        Self {
            session,
            events,
            factory,
            presenter,
            reconnect,
        }
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    pub fn transport(&self) -> MockTransportHandle {
        self.factory.last().expect("a transport was created")
    }

    /// Init with `S1`/`T1`, open, and complete the handshake with `I1&K1`.
    pub async fn ready(&self) -> MockTransportHandle {
        self.session.init("S1", "T1").await.expect("session running");
        flush().await;

        let transport = self.transport();
        transport.fire_open();
        flush().await;
        transport.fire_message("I1&K1");
        flush().await;
        transport
    }
}
