//! Error types for the PubNub socket adapter.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Fallible internal operations return [`Result<T>`] which uses [`Error`].
//! The public [`Socket`](crate::Socket) surface never returns these directly;
//! they reach the caller as `onclose` / `onerror` events.
//!
//! ```ignore
//! use pubnub_socket::{ConnectionParams, ConnectionDefaults, Result};
//!
//! fn example() -> Result<()> {
//!     let params = ConnectionParams::from_url(
//!         "wss://ps.pndsn.com/pub-key/sub-key/room",
//!         &ConnectionDefaults::default(),
//!     )?;
//!     println!("{}", params.channel());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::MissingUrl`], [`Error::InvalidUrl`], [`Error::InvalidChannel`] |
//! | Connection | [`Error::Connection`], [`Error::Service`], [`Error::SessionStopped`] |
//! | Protocol | [`Error::Protocol`], [`Error::Decode`] |
//! | External | [`Error::Json`], [`Error::Http`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection parameters are incomplete or inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No URL was supplied.
    #[error("Missing URL")]
    MissingUrl,

    /// The URL could not be interpreted as a socket address.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Channel name is empty or uses multi-channel syntax.
    #[error("Invalid channel '{channel}': {message}")]
    InvalidChannel {
        /// The rejected channel name.
        channel: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport-level failure (request could not be opened or read).
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("Service returned HTTP {status}: {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The channel session has already been stopped.
    #[error("Session stopped for channel: {channel}")]
    SessionStopped {
        /// Channel whose session is stopped.
        channel: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed envelope or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Inbound payload text could not be decoded to bytes.
    #[error("Payload decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid channel error.
    #[inline]
    pub fn invalid_channel(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidChannel {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a service status error.
    #[inline]
    pub fn service(status: u16, body: impl Into<String>) -> Self {
        Self::Service {
            status,
            body: body.into(),
        }
    }

    /// Creates a session stopped error.
    #[inline]
    pub fn session_stopped(channel: impl Into<String>) -> Self {
        Self::SessionStopped {
            channel: channel.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a payload decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::decode(err.to_string())
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a configuration error.
    ///
    /// Configuration errors are reported synchronously and never retried.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::MissingUrl
                | Self::InvalidUrl { .. }
                | Self::InvalidChannel { .. }
                | Self::Url(_)
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Service { .. } | Self::Http(_)
        )
    }

    /// Returns `true` if a channel session should retry after this error.
    ///
    /// Client-side rejections from the service (4xx other than 408 and 429)
    /// are terminal; every other transport failure is retried.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            Self::Connection { .. } | Self::Http(_) => true,
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("stream reset");
        assert_eq!(err.to_string(), "Connection failed: stream reset");
    }

    #[test]
    fn test_missing_url_display() {
        assert_eq!(Error::MissingUrl.to_string(), "Missing URL");
    }

    #[test]
    fn test_invalid_channel_display() {
        let err = Error::invalid_channel("a,b", "multi-channel syntax is not supported");
        assert_eq!(
            err.to_string(),
            "Invalid channel 'a,b': multi-channel syntax is not supported"
        );
    }

    #[test]
    fn test_is_config_error() {
        assert!(Error::MissingUrl.is_config_error());
        assert!(Error::invalid_channel("a,b", "x").is_config_error());
        assert!(Error::invalid_url("nope", "x").is_config_error());
        assert!(!Error::connection("x").is_config_error());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::connection("reset").is_retryable());
        assert!(Error::service(503, "").is_retryable());
        assert!(Error::service(429, "").is_retryable());
        assert!(Error::service(408, "").is_retryable());
        assert!(!Error::service(403, "Forbidden").is_retryable());
        assert!(!Error::service(400, "Invalid Subscribe Key").is_retryable());
        assert!(!Error::session_stopped("room").is_retryable());
        assert!(!Error::MissingUrl.is_retryable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_base64_error() {
        use base64::Engine;
        let b64_err = base64::engine::general_purpose::STANDARD
            .decode("!!!")
            .unwrap_err();
        let err: Error = b64_err.into();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
