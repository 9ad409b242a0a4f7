//! # Lifeline
//!
//! Keeps one client session alive against a server over a WebSocket, falling
//! back to HTTP long-polling when the WebSocket keeps failing.
//!
//! ```text
//!            ClientConfig ── base_url ──► Endpoints
//!                 │
//!                 ▼
//!  spawn_session ─┬─► StandardTransportFactory ─┬─► WebSocketTransport
//!                 │                             └─► LongPollTransport
//!                 ├─► HttpReconnectClient
//!                 └─► SessionManager (spawned) ◄──► Session handle
//! ```
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use lifeline::{presenter::TracingPresenter, spawn_session, ClientConfig, SessionEvent};
//!
//! let config = ClientConfig::new("https://example.com".parse()?);
//! let live = spawn_session(&config, TracingPresenter)?;
//! live.session.init("session-id", "access-token").await?;
//!
//! while let Ok(event) = live.events.recv().await {
//!     if let SessionEvent::Ready = event {
//!         live.session.send("hello", &[("name", "world")]).await;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoints;
pub mod error;
pub mod factory;

use futures::{future::AbortHandle, FutureExt};
use lifeline_core::{spawn::Spawn, timeout::Timeout};
use lifeline_http_longpoll::{HttpClient, HttpReconnectClient};

pub use config::ClientConfig;
pub use endpoints::Endpoints;
pub use error::EndpointError;
pub use factory::StandardTransportFactory;
pub use lifeline_core::{
    presenter, Session, SessionConfig, SessionEvent, SessionManager, SessionState, SessionStatus,
};

#[cfg(feature = "reqwest")]
use lifeline_core::{spawn::TokioSpawn, timeout::TimeoutTokio};
#[cfg(feature = "reqwest")]
use lifeline_http_longpoll::ReqwestHttpClient;

/// A spawned session: the handle, its events, and the actor task.
#[derive(Debug)]
pub struct LiveSession {
    /// Handle for `init`, `send`, `reconnect` and `close`.
    pub session: Session,

    /// Notifications for the application.
    pub events: async_channel::Receiver<SessionEvent>,

    /// Aborts the actor without a graceful close.
    pub task: AbortHandle,
}

/// Build a session on tokio with the reqwest HTTP client and spawn it.
///
/// Must be called from within a tokio runtime.
#[cfg(feature = "reqwest")]
pub fn spawn_session<P: presenter::Presenter>(
    config: &ClientConfig,
    presenter: P,
) -> Result<LiveSession, EndpointError> {
    let http = ReqwestHttpClient::with_connect_timeout(core::time::Duration::from_millis(
        config.connect_timeout_ms,
    ));
    spawn_session_with(config, presenter, http, TokioSpawn, TimeoutTokio)
}

/// Build a session from explicit collaborators and spawn it on `spawner`.
pub fn spawn_session_with<P, H, S, O>(
    config: &ClientConfig,
    presenter: P,
    http: H,
    spawner: S,
    timeout: O,
) -> Result<LiveSession, EndpointError>
where
    P: presenter::Presenter,
    H: HttpClient,
    S: Spawn + Clone + Send + Sync + 'static,
    O: Timeout,
{
    let endpoints = config.endpoints()?;
    let long_poll = config.long_poll_options(&endpoints);

    let factory = if config.persistent {
        StandardTransportFactory::new(
            config.websocket_options(&endpoints),
            long_poll,
            http.clone(),
            spawner.clone(),
            timeout.clone(),
        )
    } else {
        StandardTransportFactory::polling_only(
            long_poll,
            http.clone(),
            spawner.clone(),
            timeout.clone(),
        )
    };

    let reconnect = HttpReconnectClient::new(endpoints.reconnect.clone(), http, timeout)
        .with_request_timeout(config.reconnect_timeout());

    let (session, manager, events) =
        SessionManager::new(config.session, factory, reconnect, presenter, spawner.clone());
    let task = spawner.spawn(manager.run().boxed());

    tracing::info!(base_url = %config.base_url, persistent = config.persistent, "session spawned");
    Ok(LiveSession {
        session,
        events,
        task,
    })
}
