//! Signature primitives.
//!
//! Everything that touches key material or signature bytes lives here:
//! - `personal_sign.rs` - keccak personal-sign hashing, signing, recovery
//! - `keys.rs`          - compressed secp256k1 persona keys
//! - `encoding.rs`      - base64 signature encoding and serde helpers
//!
//! The server never holds private keys; `sign_personal` exists for
//! client tooling and tests.

pub mod encoding;
pub mod keys;
pub mod personal_sign;

use thiserror::Error;

use crate::error::ErrorKind;

pub use encoding::{decode_b64, decode_signature, encode_b64};
pub use keys::PublicKey;
pub use personal_sign::{
    ensure_signed_by, keccak256, personal_hash, recover_personal, sign_personal,
    verify_personal, SIGNATURE_LENGTH,
};

/// Crypto errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature is not exactly [`SIGNATURE_LENGTH`] bytes.
    #[error("signature length error: expect {expected}, got {actual}")]
    SignatureLength {
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// Recovery byte `v` is not one of 0, 1, 27, 28.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// `(r, s)` could not be parsed.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// No public key could be recovered from the signature.
    #[error("public key recovery failed")]
    RecoveryFailed,

    /// Recovered signer is not the expected key.
    #[error("signer mismatch: expect {expected}, recovered {recovered}")]
    SignerMismatch {
        /// Expected key (wire form).
        expected: String,
        /// Recovered key (wire form).
        recovered: String,
    },

    /// Public key string does not decode to a curve point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Input is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(String),

    /// Signing with a local key failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl CryptoError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPublicKey(_) | Self::Base64(_) => ErrorKind::Param,
            _ => ErrorKind::InvalidSignature,
        }
    }
}
