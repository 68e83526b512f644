//! Persona Keys
//!
//! A persona is a secp256k1 public key. On the wire it is `0x`-prefixed
//! compressed hex; at rest it is the same hex without the prefix.
//! Uncompressed input (65 bytes with `04` tag, or 64 raw bytes) is
//! accepted and canonicalized.

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;

use super::personal_sign::keccak256;
use super::CryptoError;

/// Compressed SEC1 length.
pub const COMPRESSED_LENGTH: usize = 33;

/// A secp256k1 persona public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parse hex, with or without `0x`, compressed or uncompressed.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let trimmed = text.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let mut bytes = hex::decode(hex_part)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("{}: {}", text, e)))?;

        // Raw X||Y without the SEC1 tag.
        if bytes.len() == 64 {
            bytes.insert(0, 0x04);
        }

        Self::from_sec1_bytes(&bytes)
    }

    /// Decode SEC1 bytes (33 or 65).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| {
                CryptoError::InvalidPublicKey(format!(
                    "not a secp256k1 point ({} bytes)",
                    bytes.len()
                ))
            })
    }

    /// Compressed SEC1 bytes.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LENGTH] {
        let point = self.0.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LENGTH];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Canonical at-rest form: compressed hex, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Wire form: `0x` + compressed hex.
    pub fn to_wire(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Ethereum-style address: last 20 bytes of keccak256(X||Y).
    pub fn address(&self) -> [u8; 20] {
        let point = self.0.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        out
    }

    /// `0x`-prefixed lowercase hex address.
    pub fn address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address()))
    }

    /// Address equality, tolerant of however either key was encoded.
    pub fn matches(&self, other: &PublicKey) -> bool {
        self.address() == other.address()
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(k256::PublicKey::from(key))
    }
}

impl From<&VerifyingKey> for PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        Self(k256::PublicKey::from(key))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl std::str::FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
