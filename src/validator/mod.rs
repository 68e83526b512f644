//! Platform Validators
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    VALIDATORS                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  registry.rs - Immutable Platform -> Validator table         │
//! │  source.rs   - ContentSource contract + in-memory source     │
//! │  headless.rs - Headless renderer client                      │
//! │  post.rs     - Post-based platforms (twitter, dns, ...)      │
//! │  wallet.rs   - Wallet co-signed platforms (ethereum, solana) │
//! │  persona.rs  - Persona-to-persona bindings                   │
//! │  kv.rs       - KV pseudo-platform                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every adapter implements [`Validator`]. Validation is the only place a
//! claim gains its `signature`; the chain engine trusts nothing else.

pub mod headless;
pub mod kv;
pub mod persona;
pub mod post;
pub mod registry;
pub mod source;
pub mod wallet;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::{ensure_signed_by, CryptoError};
use crate::error::ErrorKind;
use crate::payload::{build_sign_payload, Action, Claim, PayloadError, PayloadFields, Platform};

pub use headless::{resolve_page, HeadlessSource, ProofPage};
pub use kv::KvValidator;
pub use persona::PersonaValidator;
pub use post::{IdentityRule, PostPlatform, PostValidator};
pub use registry::{RegistryBuilder, ValidatorRegistry};
pub use source::{ContentSource, FetchRequest, FetchedPost, MemorySource};
pub use wallet::{EthereumValidator, SolanaValidator};

/// Placeholder the client replaces with `base64(signature)` before posting.
pub const SIGNATURE_PLACEHOLDER: &str = "%SIG_BASE64%";

/// Localized post text, keyed by locale (`default`, `en_US`, `zh_CN`).
pub type PostContent = BTreeMap<String, String>;

/// Validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No validator for the platform.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The platform does not accept this action.
    #[error("action {action} is not supported on {platform}")]
    UnsupportedAction {
        /// Platform.
        platform: Platform,
        /// Rejected action.
        action: Action,
    },

    /// Identity string is malformed for the platform.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// A required input is absent.
    #[error("missing {0}")]
    Missing(&'static str),

    /// Proof location cannot be resolved for fetching.
    #[error("invalid proof location: {0}")]
    InvalidLocation(String),

    /// Platform fetch failed or timed out.
    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    /// Published content belongs to someone else.
    #[error("identity mismatch: expect {expected}, got {actual}")]
    IdentityMismatch {
        /// Claimed identity.
        expected: String,
        /// Author of the fetched content.
        actual: String,
    },

    /// Published content carries no signature.
    #[error("signature not found in published content")]
    SignatureNotFound,

    /// Persona signature is malformed or from the wrong key.
    #[error("invalid signature: {0}")]
    Crypto(#[from] CryptoError),

    /// Co-signature (wallet / target persona) failed.
    #[error("invalid co-signature: {0}")]
    CoSignature(String),

    /// Payload could not be built.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl ValidationError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            Self::UnsupportedAction { .. }
            | Self::InvalidIdentity(_)
            | Self::Missing(_)
            | Self::InvalidLocation(_) => ErrorKind::Param,
            Self::ExternalUnavailable(_) => ErrorKind::ExternalUnavailable,
            Self::IdentityMismatch { .. } => ErrorKind::IdentityMismatch,
            Self::SignatureNotFound | Self::CoSignature(_) => ErrorKind::InvalidSignature,
            Self::Crypto(e) => e.kind(),
            Self::Payload(e) => e.kind(),
        }
    }
}

/// Contract every platform adapter satisfies.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Canonical form of a user-supplied identity.
    fn normalize_identity(&self, identity: &str) -> Result<String, ValidationError> {
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidIdentity("empty identity".to_string()));
        }
        Ok(trimmed.to_string())
    }

    /// Extra payload fields beyond the claim's own.
    fn payload_extras<'a>(&self, fields: PayloadFields<'a>, _claim: &Claim) -> PayloadFields<'a> {
        fields
    }

    /// The exact string the persona must sign.
    fn generate_sign_payload(&self, claim: &Claim) -> Result<String, ValidationError> {
        let identity = self.normalize_identity(&claim.identity)?;
        let fields = PayloadFields {
            identity: &identity,
            ..claim.payload_fields()?
        };
        let fields = self.payload_extras(fields, claim);
        Ok(build_sign_payload(&fields)?)
    }

    /// Text the user publishes on the platform; `None` when there is no
    /// post step.
    fn generate_post_payload(&self, _claim: &Claim) -> Option<PostContent> {
        None
    }

    /// Confirm the claim and fill in `signature` (and `alt_id`).
    async fn validate(&self, claim: &mut Claim) -> Result<(), ValidationError>;
}

/// Shared path for claims authorized by a detached persona signature
/// carried in `extra.signature` (e.g. deletes).
pub(crate) fn validate_detached<V: Validator + ?Sized>(
    validator: &V,
    claim: &mut Claim,
) -> Result<(), ValidationError> {
    let signature = claim
        .extra
        .persona_signature()
        .ok_or(ValidationError::Missing("extra.signature"))?
        .to_vec();

    let payload = validator.generate_sign_payload(claim)?;
    ensure_signed_by(payload.as_bytes(), &signature, &claim.persona)?;
    claim.identity = validator.normalize_identity(&claim.identity)?;
    claim.signature = Some(signature);
    Ok(())
}

/// Render a template with `{identity}` and `{persona}` substituted.
pub(crate) fn render_template(template: &str, claim: &Claim) -> String {
    template
        .replace("{identity}", &claim.identity)
        .replace("{persona}", &claim.persona.to_wire())
}

#[cfg(test)]
pub(crate) mod test_support {
    use k256::ecdsa::SigningKey;

    use crate::crypto::{sign_personal, PublicKey};

    /// Deterministic test signer.
    pub struct TestSigner {
        key: SigningKey,
    }

    impl TestSigner {
        pub fn new(seed: u8) -> Self {
            Self {
                key: SigningKey::from_slice(&[seed; 32]).unwrap(),
            }
        }

        pub fn public_key(&self) -> PublicKey {
            PublicKey::from(self.key.verifying_key())
        }

        pub fn sign(&self, payload: &str) -> Vec<u8> {
            sign_personal(payload.as_bytes(), &self.key).unwrap().to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;

    #[test]
    fn test_error_kinds() {
        let short = ValidationError::Crypto(CryptoError::SignatureLength { expected: 65, actual: 64 });
        assert_eq!(short.kind(), ErrorKind::InvalidSignature);
        assert!(short.to_string().contains("signature length error"));
        assert!(short.to_string().contains("64"));

        let key = ValidationError::Crypto(CryptoError::InvalidPublicKey("x".into()));
        assert_eq!(key.kind(), ErrorKind::Param);

        assert_eq!(
            ValidationError::ExternalUnavailable("timeout".into()).kind(),
            ErrorKind::ExternalUnavailable
        );
        assert_eq!(
            ValidationError::UnsupportedPlatform("myspace".into()).kind(),
            ErrorKind::UnsupportedPlatform
        );
    }
}
