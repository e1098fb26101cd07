//! HTTP transport seam.
//!
//! The client hands a signed parameter set to a [`Transport`] and classifies whatever
//! comes back. [`ReqwestTransport`] is the default implementation; any other
//! implementation must likewise leave redirects unfollowed, since a 302 from the
//! cashier endpoint is part of the protocol.

use crate::errors::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};

/// A single outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method; `POST` sends a form body, `GET` a query string
    pub method: Method,
    /// Absolute endpoint URL
    pub url: String,
    /// Signed, non-empty parameters
    pub params: Vec<(String, String)>,
}

/// What came back from the gateway.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Final request URL
    pub url: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a response without headers.
    pub fn new(status: StatusCode, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Returns the `Location` header, if present and valid UTF-8.
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    }
}

/// Sends a request and returns the raw response.
///
/// Only failures that leave no response to classify (connection, TLS, timeout)
/// are errors. Non-2xx statuses are returned as ordinary responses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request attempt.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// [`Transport`] backed by `reqwest`, with redirect following disabled.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh client that never follows redirects.
    pub fn new() -> Result<Self> {
        let client = Client::builder().redirect(Policy::none()).build()?;
        Ok(Self { client })
    }

    /// Wraps a preconfigured client (timeouts, proxies).
    ///
    /// The client must be built with `redirect(Policy::none())`.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let builder = if request.method == Method::GET {
            self.client.get(&request.url).query(&request.params)
        } else {
            self.client
                .request(request.method.clone(), &request.url)
                .form(&request.params)
        };

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, LOCATION};

    #[test]
    fn test_location_header() {
        let mut response = TransportResponse::new(StatusCode::FOUND, "https://payjs.cn/api/cashier", "");
        assert_eq!(response.location(), None);

        response
            .headers
            .insert(LOCATION, HeaderValue::from_static("https://payjs.cn/cashier/1"));
        assert_eq!(response.location().as_deref(), Some("https://payjs.cn/cashier/1"));
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }
}
