//! Outgoing data written to a shared port.

use crate::encoding::{character_bytes, Encoding};
use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;

/// Errors converting request data into bytes.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("No data supplied")]
    Missing,

    #[error("Data type {0} is not supported")]
    UnsupportedType(String),

    #[error("Data must be a string, an array of bytes or a {{data, type}} object")]
    InvalidShape,

    #[error("Value {0} is not a byte")]
    ByteOutOfRange(String),

    #[error("Invalid hex data: {0}")]
    InvalidHex(String),

    #[error("Invalid base64 data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

impl From<hex::FromHexError> for PayloadError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}

/// Data to send, as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortData {
    /// Text, converted with the port's charset.
    Plain(String),
    /// Hex digits, either contiguous pairs or `x`-separated values.
    Hex(String),
    Base64(String),
    Bytes(Vec<u8>),
}

impl PortData {
    /// Read the `data` member of request parameters.
    ///
    /// `data` is a string, an array of byte values, or `{ "data": ..., "type": ... }`
    /// where `type` is `PLAIN`, `HEX` or `BASE64`.
    pub fn from_params(params: &Value) -> Result<Self, PayloadError> {
        let data = params.get("data").filter(|v| !v.is_null()).ok_or(PayloadError::Missing)?;
        match data {
            Value::Object(meta) => {
                let inner = meta.get("data").filter(|v| !v.is_null()).ok_or(PayloadError::Missing)?;
                let kind = meta
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("PLAIN")
                    .to_ascii_uppercase();
                match kind.as_str() {
                    "PLAIN" => Self::plain(inner),
                    "HEX" => Ok(Self::Hex(string(inner)?)),
                    "BASE64" => Ok(Self::Base64(string(inner)?)),
                    _ => Err(PayloadError::UnsupportedType(kind)),
                }
            }
            other => Self::plain(other),
        }
    }

    fn plain(value: &Value) -> Result<Self, PayloadError> {
        match value {
            Value::Array(items) => items.iter().map(byte).collect::<Result<_, _>>().map(Self::Bytes),
            other => Ok(Self::Plain(string(other)?)),
        }
    }

    /// Convert to the bytes written to the transport.
    pub fn to_bytes(&self, encoding: Encoding) -> Result<Vec<u8>, PayloadError> {
        match self {
            Self::Plain(text) => Ok(character_bytes(text, encoding)),
            Self::Hex(digits) => decode_hex(digits),
            Self::Base64(data) => Ok(base64::engine::general_purpose::STANDARD.decode(data.trim())?),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<&str> for PortData {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl From<Vec<u8>> for PortData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

fn string(value: &Value) -> Result<String, PayloadError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(PayloadError::InvalidShape),
    }
}

/// Signed and unsigned byte values are both accepted.
fn byte(value: &Value) -> Result<u8, PayloadError> {
    value
        .as_i64()
        .filter(|n| (-128..=255).contains(n))
        .map(|n| (n & 0xFF) as u8)
        .ok_or_else(|| PayloadError::ByteOutOfRange(value.to_string()))
}

fn decode_hex(digits: &str) -> Result<Vec<u8>, PayloadError> {
    let digits = digits.trim();
    if digits.contains(['x', 'X']) {
        digits
            .trim_matches(['x', 'X'])
            .split(['x', 'X'])
            .map(|part| u8::from_str_radix(part, 16).map_err(|_| PayloadError::InvalidHex(part.to_string())))
            .collect()
    } else {
        Ok(hex::decode(digits)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string() {
        let data = PortData::from_params(&json!({"data": "hi\\n"})).unwrap();
        assert_eq!(data, PortData::Plain("hi\\n".to_string()));
        assert_eq!(data.to_bytes(Encoding::Utf8).unwrap(), b"hi\n");
    }

    #[test]
    fn test_byte_array() {
        let data = PortData::from_params(&json!({"data": [2, 65, -1, 255]})).unwrap();
        assert_eq!(data.to_bytes(Encoding::Utf8).unwrap(), vec![2, 65, 255, 255]);

        let err = PortData::from_params(&json!({"data": [256]})).unwrap_err();
        assert!(matches!(err, PayloadError::ByteOutOfRange(_)));
    }

    #[test]
    fn test_hex_forms() {
        let separated = PortData::from_params(&json!({"data": {"type": "hex", "data": "x02x41x0D"}})).unwrap();
        assert_eq!(separated.to_bytes(Encoding::Utf8).unwrap(), vec![0x02, 0x41, 0x0D]);

        let contiguous = PortData::Hex("02410d".to_string());
        assert_eq!(contiguous.to_bytes(Encoding::Utf8).unwrap(), vec![0x02, 0x41, 0x0D]);

        assert!(PortData::Hex("zz".to_string()).to_bytes(Encoding::Utf8).is_err());
    }

    #[test]
    fn test_base64() {
        let data = PortData::from_params(&json!({"data": {"type": "BASE64", "data": "SGk="}})).unwrap();
        assert_eq!(data.to_bytes(Encoding::Utf8).unwrap(), b"Hi");
    }

    #[test]
    fn test_plain_uses_charset() {
        let data = PortData::from("é");
        assert_eq!(data.to_bytes(Encoding::Latin1).unwrap(), vec![0xE9]);
        assert_eq!(data.to_bytes(Encoding::Utf16Be).unwrap(), vec![0x00, 0xE9]);
    }

    #[test]
    fn test_rejected_shapes() {
        assert!(matches!(PortData::from_params(&json!({})), Err(PayloadError::Missing)));
        assert!(matches!(
            PortData::from_params(&json!({"data": {"type": "FILE", "data": "/etc/passwd"}})),
            Err(PayloadError::UnsupportedType(t)) if t == "FILE"
        ));
        assert!(matches!(
            PortData::from_params(&json!({"data": {"nested": true}})),
            Err(PayloadError::Missing)
        ));
    }
}
