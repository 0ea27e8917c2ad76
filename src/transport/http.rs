//! `reqwest`-backed [`Transport`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{PublishRequest, PublishResponse, SubscribeRequest};

use super::{ByteStream, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for establishing the TCP/TLS connection.
///
/// No read timeout is set; subscribe streams stay open indefinitely.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum error body length kept in [`Error::Service`].
const MAX_ERROR_BODY: usize = 512;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("pubnub-socket/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HttpTransport
// ============================================================================

/// HTTP transport over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Creates a transport over an existing client.
    #[inline]
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

// ============================================================================
// HttpTransport - Transport
// ============================================================================

#[async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, request: &SubscribeRequest) -> Result<ByteStream> {
        debug!(channel = %request.channel, cursor = %request.cursor, "Opening subscribe stream");

        let response = self.client.get(request.url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::service(status.as_u16(), truncate(body)));
        }

        trace!(channel = %request.channel, status = status.as_u16(), "Subscribe stream open");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));

        Ok(Box::pin(body))
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse> {
        trace!(channel = %request.channel, bytes = request.body.len(), "Publishing");

        let response = self
            .client
            .post(request.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(PublishResponse::from_http(status, body))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Caps an error body at [`MAX_ERROR_BODY`] bytes on a char boundary.
fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

// ============================================================================
// Tests
// ============================================================================
