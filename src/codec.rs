//! Text encoding for binary payloads.
//!
//! The service only carries JSON, so socket payloads travel as strings.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// PayloadCodec
// ============================================================================

/// How socket bytes are written into publish bodies and read back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadCodec {
    /// Standard base64 of the raw bytes.
    #[default]
    Base64,

    /// Base64 of the comma-joined decimal byte values (`"1,2,255"`).
    ///
    /// Wire form used by older browser clients; pick it to interoperate.
    DecimalList,
}

impl PayloadCodec {
    /// Encodes bytes as printable text.
    #[must_use]
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64 => Base64Standard.encode(bytes),
            Self::DecimalList => {
                let joined = bytes
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                Base64Standard.encode(joined)
            }
        }
    }

    /// Decodes text produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the text is not valid for this codec.
    pub fn decode(self, text: &str) -> Result<Vec<u8>> {
        let raw = Base64Standard.decode(text.trim())?;

        match self {
            Self::Base64 => Ok(raw),
            Self::DecimalList => {
                let list = String::from_utf8(raw)
                    .map_err(|e| Error::decode(format!("decimal list is not UTF-8: {e}")))?;

                if list.is_empty() {
                    return Ok(Vec::new());
                }

                list.split(',')
                    .map(|part| {
                        part.trim()
                            .parse::<u8>()
                            .map_err(|e| Error::decode(format!("bad byte value {part:?}: {e}")))
                    })
                    .collect()
            }
        }
    }

    /// Decodes a message value from the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the value is not a string or fails
    /// [`decode`](Self::decode).
    pub fn decode_value(self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::String(text) => self.decode(text),
            other => Err(Error::decode(format!(
                "expected a string payload, got {}",
                json_kind(other)
            ))),
        }
    }
}

#[inline]
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base64_known_value() {
        assert_eq!(PayloadCodec::Base64.encode(&[1, 2, 255]), "AQL/");
        assert_eq!(PayloadCodec::Base64.decode("AQL/").unwrap(), vec![1, 2, 255]);
    }

    #[test]
    fn test_decimal_list_known_value() {
        // "1,2,255"
        let encoded = PayloadCodec::DecimalList.encode(&[1, 2, 255]);
        assert_eq!(encoded, "MSwyLDI1NQ==");
        assert_eq!(
            PayloadCodec::DecimalList.decode(&encoded).unwrap(),
            vec![1, 2, 255]
        );
    }

    #[test]
    fn test_empty_payloads() {
        for codec in [PayloadCodec::Base64, PayloadCodec::DecimalList] {
            let encoded = codec.encode(&[]);
            assert_eq!(encoded, "");
            assert!(codec.decode(&encoded).unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_base64() {
        let err = PayloadCodec::Base64.decode("not base64!").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_decimal_list_out_of_range() {
        let encoded = Base64Standard.encode("1,256");
        assert!(PayloadCodec::DecimalList.decode(&encoded).is_err());
    }

    #[test]
    fn test_decode_value_requires_string() {
        assert_eq!(
            PayloadCodec::Base64.decode_value(&json!("AQI=")).unwrap(),
            vec![1, 2]
        );
        let err = PayloadCodec::Base64.decode_value(&json!(12)).unwrap_err();
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn test_default_is_base64() {
        assert_eq!(PayloadCodec::default(), PayloadCodec::Base64);
    }
}
