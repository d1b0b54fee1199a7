//! The HTTP boundary.
//!
//! [`HttpTransport`] is the single seam between the CalDAV logic and the
//! network: it takes a [`DavRequest`] and hands back the raw status and body.
//! Status classification happens above it, in [`crate::client`].

use std::future::Future;
use std::pin::Pin;

use reqwest::{Client, Method};
use tracing::{debug, trace};

use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavResult};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// WebDAV verbs used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavMethod {
    Propfind,
    Report,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propfind => "PROPFIND",
            Self::Report => "REPORT",
        }
    }
}

/// One WebDAV request with an XML body.
#[derive(Clone, PartialEq, Eq)]
pub struct DavRequest {
    pub method: DavMethod,
    pub url: String,
    pub depth: u8,
    pub body: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
}

impl std::fmt::Debug for DavRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DavRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("depth", &self.depth)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Raw answer from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub status: u16,
    pub body: String,
}

impl DavResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends WebDAV requests.
///
/// Implementations report every answer, whatever its status, as `Ok`.
/// `Err` is reserved for requests that got no answer at all (connection
/// failures, timeouts), and must be a protocol error.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>>;
}

/// [`HttpTransport`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds the underlying HTTP client from the transport configuration.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the TLS backend cannot be initialised.
    pub fn new(config: &CalDavConfig) -> CalDavResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.trust_all_certificates)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                CalDavError::protocol(format!("Failed to create HTTP client: {}", e)).with_source(e)
            })?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>> {
        Box::pin(async move {
            let method = Method::from_bytes(request.method.as_str().as_bytes())
                .map_err(|e| CalDavError::protocol(format!("Invalid HTTP method: {}", e)))?;

            debug!(method = request.method.as_str(), url = %request.url, depth = request.depth, "Sending request");

            let response = self
                .client
                .request(method, &request.url)
                .header("Content-Type", "application/xml; charset=utf-8")
                .header("Depth", request.depth.to_string())
                .header("Authorization", &request.authorization)
                .body(request.body)
                .send()
                .await
                .map_err(|e| network_error(&request.url, e))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| network_error(&request.url, e))?;

            trace!(status, body = %body, "Received response");
            Ok(DavResponse { status, body })
        })
    }
}

fn network_error(url: &str, error: reqwest::Error) -> CalDavError {
    let message = if error.is_timeout() {
        format!("Request to {} timed out.", url)
    } else if error.is_connect() {
        format!("Could not connect to {}.", url)
    } else {
        format!("Request to {} failed: {}", url, error)
    };
    CalDavError::protocol(message).with_source(error)
}
