//! The session manager and its application-facing handle.

pub mod event;
pub mod handle;
pub mod manager;
pub mod state;

pub use event::SessionEvent;
pub use handle::Session;
pub use manager::SessionManager;
pub use state::{SessionState, SessionStatus};
