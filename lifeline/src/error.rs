//! Error types for wiring a session together.

use thiserror::Error;

/// The base URL cannot host the lifeline endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Only `http` and `https` bases are supported.
    #[error("unsupported base URL scheme {0:?}")]
    UnsupportedScheme(String),

    /// The base URL has no host or cannot carry a path.
    #[error("base URL {0:?} cannot be used as a base")]
    NotABase(String),

    /// Joining an endpoint path onto the base failed.
    #[error(transparent)]
    Join(#[from] url::ParseError),
}
