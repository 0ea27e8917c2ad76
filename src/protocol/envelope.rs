//! Subscribe stream envelopes and the resumption cursor.
//!
//! Each record on the subscribe stream is a JSON array whose first element
//! is the batch of messages and whose second element is the cursor to
//! resume from.
//!
//! # Format
//!
//! ```json
//! [["aGVsbG8=", "d29ybGQ="], "17000000000000000", ...]
//! ```
//!
//! Elements after the cursor are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Timetoken
// ============================================================================

/// Opaque, service-assigned resumption cursor.
///
/// The sentinel `"0"` means "from now". Only ordering by the service is
/// meaningful; the crate never does arithmetic on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Timetoken(String);

impl Timetoken {
    /// Raw value of the "from now" sentinel.
    pub const NOW_STR: &'static str = "0";

    /// The "from now" cursor.
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self(Self::NOW_STR.to_string())
    }

    /// Wraps a raw cursor value. Empty input becomes [`Timetoken::now`].
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::now()
        } else {
            Self(value)
        }
    }

    /// Returns `true` for the "from now" sentinel.
    #[inline]
    #[must_use]
    pub fn is_now(&self) -> bool {
        self.0 == Self::NOW_STR
    }

    /// Returns the cursor as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Timetoken {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timetoken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Timetoken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Timetoken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Timetoken {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("cursor must be a string or integer, got {value}"))
        })
    }
}

impl Timetoken {
    /// Accepts both string and integer cursors.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_u64() || n.is_i64() => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// One decoded record from the subscribe stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Opaque messages in service order.
    pub messages: Vec<Value>,

    /// Cursor to resume from after this batch.
    pub cursor: Timetoken,
}

impl Envelope {
    /// Creates an envelope.
    #[inline]
    #[must_use]
    pub fn new(messages: Vec<Value>, cursor: impl Into<Timetoken>) -> Self {
        Self {
            messages,
            cursor: cursor.into(),
        }
    }

    /// Interprets a parsed JSON value as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the value is not an array of at least
    /// two elements whose first is an array and whose second is a cursor.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(mut parts) = value else {
            return Err(Error::protocol("envelope is not a JSON array"));
        };

        if parts.len() < 2 {
            return Err(Error::protocol(format!(
                "envelope has {} element(s), expected at least 2",
                parts.len()
            )));
        }

        let cursor = Timetoken::from_value(&parts[1])
            .ok_or_else(|| Error::protocol(format!("invalid envelope cursor: {}", parts[1])))?;

        let messages = match parts.swap_remove(0) {
            Value::Array(messages) => messages,
            other => {
                return Err(Error::protocol(format!(
                    "envelope messages is not an array: {other}"
                )));
            }
        };

        Ok(Self { messages, cursor })
    }
}

// ============================================================================
// Record Parsing
// ============================================================================

/// Result of parsing one candidate record.
#[derive(Debug)]
pub(crate) enum RecordParse {
    /// A full envelope.
    Complete(Envelope),
    /// Input ended before the JSON value did; wait for more bytes.
    Incomplete,
    /// Not an envelope and never will be.
    Malformed(String),
}

/// Parses one candidate record.
pub(crate) fn parse_record(bytes: &[u8]) -> RecordParse {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => match Envelope::from_value(value) {
            Ok(envelope) => RecordParse::Complete(envelope),
            Err(e) => RecordParse::Malformed(e.to_string()),
        },
        Err(e) if e.is_eof() => RecordParse::Incomplete,
        Err(e) => RecordParse::Malformed(e.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
