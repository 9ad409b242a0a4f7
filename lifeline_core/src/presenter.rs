//! User-facing feedback.

/// A blocking error shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalNotice {
    /// Short heading.
    pub title: String,

    /// Explanation shown to the user.
    pub body: String,

    /// Diagnostic detail, if any.
    pub detail: Option<String>,
}

impl FatalNotice {
    /// Every reconnect attempt failed.
    #[must_use]
    pub fn cannot_connect() -> Self {
        Self {
            title: "Error".into(),
            body: "Failed to establish a connection to the server. \
                   Please reload this page and try again."
                .into(),
            detail: None,
        }
    }

    /// The server sent a frame that breaks the protocol.
    #[must_use]
    pub fn invalid_data(data: &str) -> Self {
        Self {
            title: "Error".into(),
            body: "Invalid data received from server! \
                   Try to reload and notify the site administrator."
                .into(),
            detail: Some(format!("Error data: '{data}'")),
        }
    }
}

/// Renders connection feedback. Calls are fire-and-forget.
pub trait Presenter: Send + 'static {
    /// Show the connection-lost indicator.
    fn show_connection_lost(&self);

    /// Hide the connection-lost indicator.
    fn hide_connection_lost(&self);

    /// Show a blocking error.
    fn show_fatal_error(&self, notice: &FatalNotice);

    /// A user-requested reconnect failed.
    fn reconnect_failed(&self) {}

    /// A user-requested reconnect succeeded.
    fn reconnect_succeeded(&self) {}
}

/// A [`Presenter`] that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn show_connection_lost(&self) {
        tracing::warn!("connection lost");
    }

    fn hide_connection_lost(&self) {
        tracing::info!("connection restored");
    }

    fn show_fatal_error(&self, notice: &FatalNotice) {
        tracing::error!(title = %notice.title, detail = ?notice.detail, "{}", notice.body);
    }

    fn reconnect_failed(&self) {
        tracing::warn!("reconnect failed");
    }

    fn reconnect_succeeded(&self) {
        tracing::info!("reconnect succeeded");
    }
}
