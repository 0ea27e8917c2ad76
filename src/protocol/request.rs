//! Subscribe and publish wire requests.
//!
//! # Subscribe
//!
//! ```text
//! GET {origin}/stream/{subscribeKey}/{channel}/0/{cursor}?uuid=&auth=[&filter-expr=]
//! ```
//!
//! # Publish
//!
//! ```text
//! POST {origin}/publish/{publishKey}/{subscribeKey}/0/{channel}/0?uuid=&auth=&meta=
//! body: JSON-encoded message text
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use url::Url;

use crate::config::ConnectionParams;
use crate::error::{Error, Result};
use crate::identifiers::ChannelName;

use super::envelope::Timetoken;

// ============================================================================
// Helpers
// ============================================================================

/// Builds `{base}/{segments...}` with each segment percent-encoded.
fn build_url(params: &ConnectionParams, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(&params.base_url())?;

    url.path_segments_mut()
        .map_err(|()| Error::invalid_url(params.base_url(), "URL cannot be a base"))?
        .clear()
        .extend(segments);

    Ok(url)
}

// ============================================================================
// SubscribeRequest
// ============================================================================

/// A streaming subscribe request for one channel at one cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Fully-built request URL.
    pub url: Url,

    /// Channel being subscribed.
    pub channel: ChannelName,

    /// Cursor the stream resumes from.
    pub cursor: Timetoken,
}

impl SubscribeRequest {
    /// Builds the subscribe request for `params` at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the endpoint does not form a valid URL.
    pub fn new(params: &ConnectionParams, cursor: &Timetoken) -> Result<Self> {
        let mut url = build_url(
            params,
            &[
                "stream",
                params.subscribe_key(),
                params.channel().as_str(),
                "0",
                cursor.as_str(),
            ],
        )?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uuid", params.user_id());
            query.append_pair("auth", params.auth_key());
            if let Some(filter) = params.filter() {
                query.append_pair("filter-expr", filter);
            }
        }

        Ok(Self {
            url,
            channel: params.channel().clone(),
            cursor: cursor.clone(),
        })
    }
}

// ============================================================================
// PublishRequest
// ============================================================================

/// A single publish of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Fully-built request URL.
    pub url: Url,

    /// Target channel.
    pub channel: ChannelName,

    /// JSON-encoded message body.
    pub body: String,
}

impl PublishRequest {
    /// Builds a publish request carrying `message` as a JSON string.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the endpoint does not form a valid URL
    /// - [`Error::Json`] if encoding fails
    pub fn new(params: &ConnectionParams, message: &str, metadata: &Value) -> Result<Self> {
        let mut url = build_url(
            params,
            &[
                "publish",
                params.publish_key(),
                params.subscribe_key(),
                "0",
                params.channel().as_str(),
                "0",
            ],
        )?;

        let meta = serde_json::to_string(metadata)?;
        url.query_pairs_mut()
            .append_pair("uuid", params.user_id())
            .append_pair("auth", params.auth_key())
            .append_pair("meta", &meta);

        Ok(Self {
            url,
            channel: params.channel().clone(),
            body: serde_json::to_string(message)?,
        })
    }
}

// ============================================================================
// PublishResponse
// ============================================================================

/// Raw outcome of a publish request that reached the service.
///
/// # Format
///
/// ```json
/// [1, "Sent", "17000000000000000"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: String,

    /// Service description (e.g. `"Sent"`), when the body is a publish array.
    pub description: Option<String>,

    /// Timetoken assigned to the message, when reported.
    pub timetoken: Option<Timetoken>,
}

impl PublishResponse {
    /// Interprets an HTTP status and body.
    #[must_use]
    pub fn from_http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();

        let parsed = serde_json::from_str::<Value>(&body).ok();
        let parts = parsed.as_ref().and_then(Value::as_array);

        let description = parts
            .and_then(|p| p.get(1))
            .and_then(Value::as_str)
            .map(str::to_string);

        let timetoken = parts.and_then(|p| p.get(2)).and_then(|v| match v {
            Value::String(s) => Some(Timetoken::new(s.clone())),
            Value::Number(n) => Some(Timetoken::new(n.to_string())),
            _ => None,
        });

        Self {
            status,
            body,
            description,
            timetoken,
        }
    }

    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ============================================================================
// Tests
// ============================================================================
