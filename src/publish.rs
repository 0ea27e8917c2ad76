//! Outbound messages.
//!
//! Each send is one independent `POST /publish/...`. Failures never surface
//! as errors; the caller gets [`PublishOutcome::Failed`] instead.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::PayloadCodec;
use crate::config::ConnectionParams;
use crate::protocol::{PublishRequest, PublishResponse};
use crate::transport::Transport;

// ============================================================================
// PublishOutcome
// ============================================================================

/// Result of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The service answered. The status may still be non-2xx.
    Sent(PublishResponse),

    /// The request could not be built or no response arrived.
    Failed,
}

impl PublishOutcome {
    /// Returns `true` if the service answered with a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent(response) if response.is_success())
    }

    /// Returns `true` for [`PublishOutcome::Failed`].
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns the service response, if any.
    #[inline]
    #[must_use]
    pub fn response(&self) -> Option<&PublishResponse> {
        match self {
            Self::Sent(response) => Some(response),
            Self::Failed => None,
        }
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Publishes byte payloads to one channel.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    params: ConnectionParams,
    codec: PayloadCodec,
    metadata: Value,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("channel", self.params.channel())
            .field("codec", &self.codec)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Creates a publisher with the default codec and `{}` metadata.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, params: ConnectionParams) -> Self {
        Self {
            transport,
            params,
            codec: PayloadCodec::default(),
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    /// Sets the payload codec.
    #[inline]
    #[must_use]
    pub fn with_codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the metadata attached to every publish.
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the connection parameters.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Publishes `data` with the configured metadata.
    pub async fn publish(&self, data: &[u8]) -> PublishOutcome {
        self.publish_with_metadata(data, &self.metadata).await
    }

    /// Publishes `data` with explicit metadata.
    pub async fn publish_with_metadata(&self, data: &[u8], metadata: &Value) -> PublishOutcome {
        let message = self.codec.encode(data);

        let request = match PublishRequest::new(&self.params, &message, metadata) {
            Ok(request) => request,
            Err(e) => {
                warn!(channel = %self.params.channel(), error = %e, "Publish request invalid");
                return PublishOutcome::Failed;
            }
        };

        match self.transport.publish(&request).await {
            Ok(response) => {
                debug!(
                    channel = %self.params.channel(),
                    status = response.status,
                    bytes = data.len(),
                    "Publish completed"
                );
                PublishOutcome::Sent(response)
            }
            Err(e) => {
                warn!(channel = %self.params.channel(), error = %e, "Publish failed");
                PublishOutcome::Failed
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::config::ConnectionParamsBuilder;
    use crate::error::{Error, Result};
    use crate::protocol::SubscribeRequest;
    use crate::transport::ByteStream;

    #[derive(Default)]
    struct RecordingTransport {
        fail: bool,
        requests: Mutex<Vec<PublishRequest>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn open_stream(&self, _request: &SubscribeRequest) -> Result<ByteStream> {
            Err(Error::connection("unused"))
        }

        async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse> {
            self.requests.lock().push(request.clone());
            if self.fail {
                Err(Error::connection("refused"))
            } else {
                Ok(PublishResponse::from_http(200, "[1,\"Sent\",\"42\"]"))
            }
        }
    }

    fn params() -> ConnectionParams {
        ConnectionParamsBuilder::new()
            .origin("test.local")
            .channel("room")
            .user_id("u")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_sends_encoded_body() {
        let transport = Arc::new(RecordingTransport::default());
        let publisher = Publisher::new(transport.clone(), params());

        let outcome = publisher.publish(&[1, 2, 255]).await;

        assert!(outcome.is_success());
        assert_eq!(
            outcome.response().and_then(|r| r.timetoken.clone()).unwrap().as_str(),
            "42"
        );

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, "\"AQL/\"");
        assert!(requests[0].url.query().unwrap().contains("meta=%7B%7D"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_sentinel() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let publisher = Publisher::new(transport, params());

        let outcome = publisher.publish(b"x").await;
        assert!(outcome.is_failed());
        assert!(outcome.response().is_none());
    }

    #[tokio::test]
    async fn test_publish_with_metadata_and_codec() {
        let transport = Arc::new(RecordingTransport::default());
        let publisher = Publisher::new(transport.clone(), params())
            .with_codec(PayloadCodec::DecimalList)
            .with_metadata(json!({"k": "v"}));

        publisher.publish(&[1, 2, 255]).await;

        let requests = transport.requests.lock();
        assert_eq!(requests[0].body, "\"MSwyLDI1NQ==\"");
        let meta = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "meta")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(meta, r#"{"k":"v"}"#);
    }

    #[test]
    fn test_outcome_non_2xx_is_not_success() {
        let outcome = PublishOutcome::Sent(PublishResponse::from_http(403, "Forbidden"));
        assert!(!outcome.is_success());
        assert!(!outcome.is_failed());
    }
}
