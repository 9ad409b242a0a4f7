//! # Lifeline Core
//!
//! Keeps one logical client session alive across a persistent connection
//! or a long-poll fallback.
//!
//! ```text
//!   application
//!       │ init / send / reconnect          ▲ SessionEvent
//!       ▼                                  │
//! ┌───────────────────────────────────────────────────┐
//! │                  SessionManager                   │
//! │  identity · continuation token · retry counter    │
//! │  HealthMonitor (silence timer)                    │
//! └───────┬──────────────────────────────▲────────────┘
//!         │ Box<dyn Transport>           │ (TransportId, TransportEvent)
//!         ▼                              │
//!   persistent (WebSocket)  ──or──  polling (HTTP long-poll)
//! ```
//!
//! The manager is an actor: all session state lives in one task and is only
//! touched while handling one input at a time. Transports report back through
//! an [`EventSink`](transport::EventSink) that can be detached, so a
//! transport that has been abandoned can never reach the session again.

pub mod config;
pub mod error;
pub mod frame;
pub mod health;
pub mod id;
pub mod presenter;
pub mod reconnect;
pub mod session;
pub mod spawn;
pub mod timeout;
pub mod timer;
pub mod transport;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::SessionConfig;
pub use session::{Session, SessionEvent, SessionManager, SessionState, SessionStatus};
