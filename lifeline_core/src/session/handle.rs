//! The application-facing session handle.

use futures::channel::oneshot;
use tokio::sync::watch;

use super::{manager::Input, state::SessionStatus};
use crate::{
    error::SessionClosed,
    id::{AccessToken, SessionId},
};

/// A cloneable handle to a running [`SessionManager`](super::SessionManager).
#[derive(Debug, Clone)]
pub struct Session {
    inbox: async_channel::Sender<Input>,
    status: watch::Receiver<SessionStatus>,
}

impl Session {
    pub(super) fn new(
        inbox: async_channel::Sender<Input>,
        status: watch::Receiver<SessionStatus>,
    ) -> Self {
        Self { inbox, status }
    }

    /// Start a session with credentials issued by the server.
    ///
    /// Empty credentials are ignored.
    pub async fn init(
        &self,
        session_id: impl Into<SessionId>,
        access_token: impl Into<AccessToken>,
    ) -> Result<(), SessionClosed> {
        self.init_with_fallback(session_id, access_token, false).await
    }

    /// Like [`init`](Self::init), optionally skipping the persistent
    /// transport.
    pub async fn init_with_fallback(
        &self,
        session_id: impl Into<SessionId>,
        access_token: impl Into<AccessToken>,
        force_fallback: bool,
    ) -> Result<(), SessionClosed> {
        self.submit(Input::Init {
            session_id: session_id.into(),
            access_token: access_token.into(),
            force_fallback,
        })
        .await
    }

    /// Send a task with its fields.
    ///
    /// Returns `false` if nothing was transmitted: the session is not ready,
    /// the connection is lost (a reconnect starts instead), or the session
    /// has stopped.
    pub async fn send(&self, task: &str, fields: &[(&str, &str)]) -> bool {
        let (reply, rx) = oneshot::channel();
        let input = Input::Send {
            task: task.to_owned(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            reply,
        };
        if self.inbox.send(input).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Reconnect now instead of waiting for the next retry.
    pub async fn reconnect(&self) -> Result<(), SessionClosed> {
        self.submit(Input::Reconnect).await
    }

    /// Tear down the transport and stop the session.
    pub async fn close(&self) -> Result<(), SessionClosed> {
        self.submit(Input::Close).await
    }

    /// The latest status snapshot.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    async fn submit(&self, input: Input) -> Result<(), SessionClosed> {
        self.inbox.send(input).await.map_err(|_| SessionClosed)
    }
}
