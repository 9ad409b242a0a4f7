//! Server endpoints, derived from one base URL.
//!
//! ```text
//! https://example.com/app/
//!   ├── wss://example.com/app/lifeline/ws           persistent transport
//!   ├── https://example.com/app/lifeline/ajax       init + outbound frames
//!   ├── https://example.com/app/lifeline/ajax/poll  held poll requests
//!   └── https://example.com/app/lifeline/reconnect  fresh credentials
//! ```

use url::Url;

use crate::error::EndpointError;

const WEBSOCKET_PATH: &str = "lifeline/ws";
const SEND_PATH: &str = "lifeline/ajax";
const POLL_PATH: &str = "lifeline/ajax/poll";
const RECONNECT_PATH: &str = "lifeline/reconnect";

/// Every URL a session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `ws://` or `wss://` endpoint of the persistent transport.
    pub websocket: Url,

    /// Polling transport: `init` and outbound frames.
    pub send: Url,

    /// Polling transport: held poll requests.
    pub poll: Url,

    /// Out-of-band reconnect endpoint.
    pub reconnect: Url,
}

impl Endpoints {
    /// Derive all endpoints from an `http(s)` base.
    ///
    /// The base path is treated as a directory, so `https://host/app` and
    /// `https://host/app/` both mount under `/app/`. Query and fragment are
    /// dropped.
    pub fn from_base(base: &Url) -> Result<Self, EndpointError> {
        let ws_scheme = match base.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(EndpointError::UnsupportedScheme(other.to_owned())),
        };
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(EndpointError::NotABase(base.to_string()));
        }

        let mut root = base.clone();
        root.set_query(None);
        root.set_fragment(None);
        if !root.path().ends_with('/') {
            let dir = format!("{}/", root.path());
            root.set_path(&dir);
        }

        let mut websocket = root.join(WEBSOCKET_PATH)?;
        websocket
            .set_scheme(ws_scheme)
            .map_err(|()| EndpointError::UnsupportedScheme(ws_scheme.to_owned()))?;

        Ok(Self {
            websocket,
            send: root.join(SEND_PATH)?,
            poll: root.join(POLL_PATH)?,
            reconnect: root.join(RECONNECT_PATH)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn https_base_maps_to_wss() -> TestResult {
        let endpoints = Endpoints::from_base(&Url::parse("https://example.com")?)?;
        assert_eq!(endpoints.websocket.as_str(), "wss://example.com/lifeline/ws");
        assert_eq!(endpoints.send.as_str(), "https://example.com/lifeline/ajax");
        assert_eq!(endpoints.poll.as_str(), "https://example.com/lifeline/ajax/poll");
        assert_eq!(
            endpoints.reconnect.as_str(),
            "https://example.com/lifeline/reconnect"
        );
        Ok(())
    }

    #[test]
    fn http_base_keeps_port_and_prefix() -> TestResult {
        let endpoints = Endpoints::from_base(&Url::parse("http://127.0.0.1:8080/app?x=1#top")?)?;
        assert_eq!(endpoints.websocket.as_str(), "ws://127.0.0.1:8080/app/lifeline/ws");
        assert_eq!(endpoints.poll.as_str(), "http://127.0.0.1:8080/app/lifeline/ajax/poll");
        Ok(())
    }

    #[test]
    fn rejects_other_schemes() -> TestResult {
        assert_eq!(
            Endpoints::from_base(&Url::parse("ftp://example.com")?),
            Err(EndpointError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!(
            Endpoints::from_base(&Url::parse("ws://example.com")?),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        Ok(())
    }
}
