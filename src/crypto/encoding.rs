//! Base64 signature encoding.
//!
//! Signatures travel and rest as standard (padded) base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::personal_sign::SIGNATURE_LENGTH;
use super::CryptoError;

/// Encode bytes as standard base64.
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
pub fn decode_b64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::Base64(e.to_string()))
}

/// Decode a base64 signature and require exactly 65 bytes.
pub fn decode_signature(text: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = decode_b64(text)?;
    if bytes.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::SignatureLength {
            expected: SIGNATURE_LENGTH,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Serde adapter: `Vec<u8>` as base64 string.
pub mod b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as base64.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_b64(bytes))
    }

    /// Deserialize from base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode_b64(&text).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Option<Vec<u8>>` as nullable base64 string.
pub mod b64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as base64 or null.
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&super::encode_b64(b)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from base64 or null.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            Some(t) if !t.is_empty() => super::decode_b64(&t)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
