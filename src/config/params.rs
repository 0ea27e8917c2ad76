//! Connection parameters and URL parsing.
//!
//! A socket URL names the origin, the keys, and the channel. Anything the
//! URL leaves out comes from an explicit [`ConnectionDefaults`] value.
//!
//! # URL Forms
//!
//! | Form | Example |
//! |------|---------|
//! | Path keys | `wss://ps.pndsn.com/{publishKey}/{subscribeKey}/{channel}` |
//! | Channel only | `wss://ps.pndsn.com/{channel}` |
//! | Query overrides | `wss://host/room?publishKey=..&subscribeKey=..&userId=..&auth=..` |
//!
//! Recognised query keys: `endpoint`, `channel`, `publishKey`,
//! `subscribeKey`, `auth`, `userId` (or `uuid`), `filter`, `timetoken`.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identifiers::ChannelName;
use crate::protocol::Timetoken;

// ============================================================================
// Constants
// ============================================================================

/// Default service origin (HTTP/3 and IPv6 capable).
pub const DEFAULT_ORIGIN: &str = "v6.pubnub3.com";

/// Default publish and subscribe key of the public demo keyset.
pub const DEFAULT_DEMO_KEY: &str = "demo-36";

// ============================================================================
// ConnectionDefaults
// ============================================================================

/// Fallback values for parameters a URL does not specify.
///
/// Passed explicitly to [`ConnectionParams::from_url`]; never global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDefaults {
    /// Service host (optionally `host:port`).
    pub origin: String,
    /// Use HTTPS for service requests.
    pub tls: bool,
    /// Publish key.
    pub publish_key: String,
    /// Subscribe key.
    pub subscribe_key: String,
    /// Access token sent as `auth`.
    pub auth_key: String,
    /// Client identifier sent as `uuid`.
    pub user_id: String,
    /// Optional subscribe filter expression.
    pub filter: Option<String>,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            tls: true,
            publish_key: DEFAULT_DEMO_KEY.to_string(),
            subscribe_key: DEFAULT_DEMO_KEY.to_string(),
            auth_key: String::new(),
            user_id: format!("uuid-{}", Uuid::new_v4()),
            filter: None,
        }
    }
}

// ============================================================================
// ConnectionParams
// ============================================================================

/// Immutable, validated parameters for one channel connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub(crate) origin: String,
    pub(crate) tls: bool,
    pub(crate) publish_key: String,
    pub(crate) subscribe_key: String,
    pub(crate) channel: ChannelName,
    pub(crate) auth_key: String,
    pub(crate) user_id: String,
    pub(crate) filter: Option<String>,
    pub(crate) timetoken: Timetoken,
}

// ============================================================================
// ConnectionParams - Accessors
// ============================================================================

impl ConnectionParams {
    /// Returns the service host.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns `true` if requests use HTTPS.
    #[inline]
    #[must_use]
    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Returns `https://{origin}` or `http://{origin}`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.origin)
    }

    /// Returns the publish key.
    #[inline]
    #[must_use]
    pub fn publish_key(&self) -> &str {
        &self.publish_key
    }

    /// Returns the subscribe key.
    #[inline]
    #[must_use]
    pub fn subscribe_key(&self) -> &str {
        &self.subscribe_key
    }

    /// Returns the channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Returns the auth key (possibly empty).
    #[inline]
    #[must_use]
    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    /// Returns the user identifier.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the filter expression, if any.
    #[inline]
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Returns the cursor the first subscribe request starts from.
    #[inline]
    #[must_use]
    pub fn timetoken(&self) -> &Timetoken {
        &self.timetoken
    }
}

// ============================================================================
// ConnectionParams - URL Parsing
// ============================================================================

impl ConnectionParams {
    /// Derives parameters from a socket URL, filling gaps from `defaults`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingUrl`] if `url` is empty
    /// - [`Error::InvalidUrl`] if it does not parse or has no host
    /// - [`Error::Config`] if no channel can be found
    /// - [`Error::InvalidChannel`] if the channel is multi-channel syntax
    pub fn from_url(url: &str, defaults: &ConnectionDefaults) -> Result<Self> {
        let raw = url.trim();
        if raw.is_empty() {
            return Err(Error::MissingUrl);
        }

        let parsed = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

        let tls = match parsed.scheme() {
            "wss" | "https" => true,
            "ws" | "http" => false,
            other => {
                return Err(Error::invalid_url(
                    raw,
                    format!("unsupported scheme '{other}'"),
                ));
            }
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::invalid_url(raw, "missing host"))?;
        let origin = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let segments = path_segments(&parsed)?;

        let mut builder = super::ConnectionParamsBuilder::new()
            .defaults(defaults.clone())
            .origin(origin)
            .tls(tls);

        match segments.as_slice() {
            [] => {}
            [channel] | [_, channel] => {
                builder = builder.channel(channel.clone());
            }
            [publish_key, subscribe_key, channel, ..] => {
                builder = builder
                    .publish_key(publish_key.clone())
                    .subscribe_key(subscribe_key.clone())
                    .channel(channel.clone());
            }
        }

        for (key, value) in parsed.query_pairs() {
            builder = apply_query_override(builder, &key, value);
        }

        let params = builder.build()?;

        debug!(
            origin = %params.origin,
            channel = %params.channel,
            user_id = %params.user_id,
            "Connection parameters derived from URL"
        );

        Ok(params)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns the non-empty, percent-decoded path segments.
fn path_segments(url: &Url) -> Result<Vec<String>> {
    let Some(segments) = url.path_segments() else {
        return Ok(Vec::new());
    };

    segments
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(Cow::into_owned)
                .map_err(|e| Error::invalid_url(url.as_str(), e.to_string()))
        })
        .collect()
}

/// Applies one recognised query parameter to the builder.
fn apply_query_override(
    builder: super::ConnectionParamsBuilder,
    key: &str,
    value: Cow<'_, str>,
) -> super::ConnectionParamsBuilder {
    let value = value.into_owned();

    match key {
        "endpoint" | "origin" => {
            let (tls, host) = split_endpoint(&value);
            let builder = builder.origin(host);
            match tls {
                Some(tls) => builder.tls(tls),
                None => builder,
            }
        }
        "channel" => builder.channel(value),
        "publishKey" | "publish_key" | "pubkey" => builder.publish_key(value),
        "subscribeKey" | "subscribe_key" | "subkey" => builder.subscribe_key(value),
        "auth" | "authKey" | "auth_key" => builder.auth_key(value),
        "userId" | "user_id" | "uuid" => builder.user_id(value),
        "filter" | "filter-expr" => builder.filter(value),
        "timetoken" => builder.timetoken(value),
        _ => builder,
    }
}

/// Splits `wss://host` into `(Some(true), "host")`; bare hosts keep TLS unset.
fn split_endpoint(endpoint: &str) -> (Option<bool>, String) {
    let trimmed = endpoint.trim().trim_end_matches('/');

    for (prefix, tls) in [
        ("wss://", true),
        ("https://", true),
        ("ws://", false),
        ("http://", false),
    ] {
        if let Some(host) = trimmed.strip_prefix(prefix) {
            return (Some(tls), host.to_string());
        }
    }

    (None, trimmed.to_string())
}

// ============================================================================
// Tests
// ============================================================================
