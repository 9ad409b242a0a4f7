//! HTTP client for the out-of-band reconnect endpoint.

use core::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use lifeline_core::{
    frame,
    id::InstanceId,
    reconnect::{ReconnectClient, ReconnectReply},
    timeout::Timeout,
};
use url::{form_urlencoded, Url};

use crate::{error::ReconnectError, http_client::HttpClient, DEFAULT_RECONNECT_TIMEOUT};

const FORM_HEADERS: &[(&str, &str)] = &[(
    "content-type",
    "application/x-www-form-urlencoded; charset=utf-8",
)];

/// POSTs `id=<instanceId>` to the reconnect endpoint.
#[derive(Debug, Clone)]
pub struct HttpReconnectClient<H, O> {
    url: Url,
    http: H,
    timeout: O,
    request_timeout: Duration,
}

impl<H, O> HttpReconnectClient<H, O> {
    /// Create a client for the endpoint at `url` with the default deadline.
    #[must_use]
    pub fn new(url: Url, http: H, timeout: O) -> Self {
        Self {
            url,
            http,
            timeout,
            request_timeout: DEFAULT_RECONNECT_TIMEOUT,
        }
    }

    /// Override the request deadline.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl<H: HttpClient, O: Timeout> ReconnectClient for HttpReconnectClient<H, O> {
    type Error = ReconnectError;

    fn reconnect(
        &self,
        instance_id: &InstanceId,
    ) -> BoxFuture<'static, Result<ReconnectReply, Self::Error>> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("id", instance_id.as_str())
            .finish();
        let request = self
            .http
            .post(self.url.as_str(), FORM_HEADERS, body.into_bytes());
        let timeout = self.timeout.clone();
        let deadline = self.request_timeout;

        async move {
            let resp = timeout
                .timeout(deadline, request)
                .await?
                .map_err(|e| ReconnectError::Request(e.to_string()))?;

            if !resp.is_success() {
                return Err(ReconnectError::UnexpectedStatus {
                    status: resp.status,
                    body: resp.text(),
                });
            }

            Ok(frame::parse_reconnect_reply(&resp.text())?)
        }
        .boxed()
    }
}
