//! KV pseudo-platform.
//!
//! A persona patching its own document. The identity is the persona
//! itself and the signature comes straight from the request.

use async_trait::async_trait;

use super::{ValidationError, Validator};
use crate::crypto::{ensure_signed_by, PublicKey};
use crate::payload::{Action, Claim, Extra, Platform};

/// Validator for `kv_set` claims.
#[derive(Debug, Default)]
pub struct KvValidator;

#[async_trait]
impl Validator for KvValidator {
    fn platform(&self) -> Platform {
        Platform::Kv
    }

    fn normalize_identity(&self, identity: &str) -> Result<String, ValidationError> {
        Ok(PublicKey::parse(identity)?.to_wire())
    }

    async fn validate(&self, claim: &mut Claim) -> Result<(), ValidationError> {
        if claim.action != Action::KvSet {
            return Err(ValidationError::UnsupportedAction {
                platform: Platform::Kv,
                action: claim.action,
            });
        }
        if !matches!(claim.extra, Extra::KvPatch(_)) {
            return Err(ValidationError::Missing("changes"));
        }

        let identity = PublicKey::parse(&claim.identity)?;
        if !identity.matches(&claim.persona) {
            return Err(ValidationError::IdentityMismatch {
                expected: claim.persona.to_wire(),
                actual: identity.to_wire(),
            });
        }

        let signature = claim.signature.clone().ok_or(ValidationError::Missing("signature"))?;
        let payload = self.generate_sign_payload(claim)?;
        ensure_signed_by(payload.as_bytes(), &signature, &claim.persona)?;

        claim.identity = identity.to_wire();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvPatch;
    use crate::validator::test_support::TestSigner;
    use serde_json::json;

    fn kv_claim(signer: &TestSigner) -> Claim {
        let mut claim = Claim::new(
            Action::KvSet,
            Platform::Kv,
            signer.public_key().to_wire(),
            signer.public_key(),
        );
        claim.extra = Extra::KvPatch(KvPatch::setting([("bio", json!("hi"))]));
        claim
    }

    #[tokio::test]
    async fn test_kv_signed_patch() {
        let signer = TestSigner::new(4);
        let mut claim = kv_claim(&signer);

        assert!(matches!(
            KvValidator.validate(&mut claim).await,
            Err(ValidationError::Missing("signature"))
        ));

        let payload = KvValidator.generate_sign_payload(&claim).unwrap();
        assert!(payload.contains("\"patch\":{\"del\":[],\"set\":{\"bio\":\"hi\"}}"));
        claim.signature = Some(signer.sign(&payload));
        KvValidator.validate(&mut claim).await.unwrap();
    }

    #[tokio::test]
    async fn test_kv_signature_over_other_patch_rejected() {
        let signer = TestSigner::new(4);
        let mut claim = kv_claim(&signer);
        let payload = KvValidator.generate_sign_payload(&claim).unwrap();
        claim.signature = Some(signer.sign(&payload));

        claim.extra = Extra::KvPatch(KvPatch::setting([("bio", json!("bye"))]));
        assert!(matches!(
            KvValidator.validate(&mut claim).await,
            Err(ValidationError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn test_kv_rejects_other_actions_and_owners() {
        let signer = TestSigner::new(4);
        let mut claim = kv_claim(&signer);
        claim.action = Action::Create;
        assert!(matches!(
            KvValidator.validate(&mut claim).await,
            Err(ValidationError::UnsupportedAction { .. })
        ));

        let mut claim = kv_claim(&signer);
        claim.identity = TestSigner::new(5).public_key().to_wire();
        claim.signature = Some(vec![0u8; 65]);
        assert!(matches!(
            KvValidator.validate(&mut claim).await,
            Err(ValidationError::IdentityMismatch { .. })
        ));
    }
}
