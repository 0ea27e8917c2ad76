//! Builder pattern for connection parameters.
//!
//! # Example
//!
//! ```
//! use pubnub_socket::ConnectionParamsBuilder;
//!
//! # fn example() -> pubnub_socket::Result<()> {
//! let params = ConnectionParamsBuilder::new()
//!     .origin("ps.pndsn.com")
//!     .publish_key("pub-c-1")
//!     .subscribe_key("sub-c-1")
//!     .channel("documentID-223")
//!     .user_id("user-id-abc")
//!     .build()?;
//! assert_eq!(params.channel().as_str(), "documentID-223");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::identifiers::ChannelName;
use crate::protocol::Timetoken;

use super::params::{ConnectionDefaults, ConnectionParams};

// ============================================================================
// ConnectionParamsBuilder
// ============================================================================

/// Builder for [`ConnectionParams`].
///
/// Unset fields fall back to the configured [`ConnectionDefaults`]; the
/// channel has no default and must be set.
#[derive(Debug, Default, Clone)]
pub struct ConnectionParamsBuilder {
    defaults: Option<ConnectionDefaults>,
    origin: Option<String>,
    tls: Option<bool>,
    publish_key: Option<String>,
    subscribe_key: Option<String>,
    channel: Option<String>,
    auth_key: Option<String>,
    user_id: Option<String>,
    filter: Option<String>,
    timetoken: Option<Timetoken>,
}

// ============================================================================
// ConnectionParamsBuilder Implementation
// ============================================================================

impl ConnectionParamsBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the defaults used for unset fields.
    #[inline]
    #[must_use]
    pub fn defaults(mut self, defaults: ConnectionDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Sets the service host (`host` or `host:port`).
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Enables or disables HTTPS.
    #[inline]
    #[must_use]
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the publish key.
    #[inline]
    #[must_use]
    pub fn publish_key(mut self, key: impl Into<String>) -> Self {
        self.publish_key = Some(key.into());
        self
    }

    /// Sets the subscribe key.
    #[inline]
    #[must_use]
    pub fn subscribe_key(mut self, key: impl Into<String>) -> Self {
        self.subscribe_key = Some(key.into());
        self
    }

    /// Sets the channel. Validated on [`build`](Self::build).
    #[inline]
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the auth key.
    #[inline]
    #[must_use]
    pub fn auth_key(mut self, key: impl Into<String>) -> Self {
        self.auth_key = Some(key.into());
        self
    }

    /// Sets the user identifier.
    #[inline]
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the filter expression. Empty clears it.
    #[inline]
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the cursor the first subscribe request starts from.
    #[inline]
    #[must_use]
    pub fn timetoken(mut self, timetoken: impl Into<Timetoken>) -> Self {
        self.timetoken = Some(timetoken.into());
        self
    }

    /// Builds validated parameters.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the channel or origin is missing
    /// - [`Error::InvalidChannel`] if the channel is empty or contains a comma
    pub fn build(self) -> Result<ConnectionParams> {
        let defaults = self.defaults.unwrap_or_default();

        let channel = self.channel.ok_or_else(|| {
            Error::config(
                "A channel is required. Put it in the URL path or use .channel().\n\
                 Example: wss://ps.pndsn.com/{publishKey}/{subscribeKey}/{channel}",
            )
        })?;
        let channel = ChannelName::new(channel)?;

        let origin = self.origin.unwrap_or(defaults.origin);
        if origin.trim().is_empty() {
            return Err(Error::config("Service origin is empty"));
        }

        Ok(ConnectionParams {
            origin,
            tls: self.tls.unwrap_or(defaults.tls),
            publish_key: self.publish_key.unwrap_or(defaults.publish_key),
            subscribe_key: self.subscribe_key.unwrap_or(defaults.subscribe_key),
            channel,
            auth_key: self.auth_key.unwrap_or(defaults.auth_key),
            user_id: self.user_id.unwrap_or(defaults.user_id),
            filter: self.filter.or(defaults.filter).filter(|f| !f.is_empty()),
            timetoken: self.timetoken.unwrap_or_default(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
