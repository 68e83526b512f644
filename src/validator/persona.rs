//! Persona-to-persona bindings (`nextid`).
//!
//! The identity is another persona's public key. Both keys sign one
//! payload, which additionally names the claiming persona so the target's
//! signature cannot be replayed for a different claimant.

use async_trait::async_trait;
use serde_json::Value;

use super::{validate_detached, ValidationError, Validator};
use crate::crypto::{ensure_signed_by, PublicKey};
use crate::payload::{Action, Claim, Extra, PayloadFields, Platform};

/// Validator for the `nextid` platform.
#[derive(Debug, Default)]
pub struct PersonaValidator;

#[async_trait]
impl Validator for PersonaValidator {
    fn platform(&self) -> Platform {
        Platform::NextId
    }

    fn normalize_identity(&self, identity: &str) -> Result<String, ValidationError> {
        let key = PublicKey::parse(identity)?;
        Ok(key.to_wire())
    }

    fn payload_extras<'a>(&self, fields: PayloadFields<'a>, claim: &Claim) -> PayloadFields<'a> {
        fields.with_extra("persona", Value::String(claim.persona.to_wire()))
    }

    async fn validate(&self, claim: &mut Claim) -> Result<(), ValidationError> {
        match claim.action {
            Action::Create => {}
            Action::Delete => return validate_detached(self, claim),
            action => {
                return Err(ValidationError::UnsupportedAction {
                    platform: Platform::NextId,
                    action,
                })
            }
        }

        let target = PublicKey::parse(&claim.identity)?;
        if target.matches(&claim.persona) {
            return Err(ValidationError::InvalidIdentity(
                "a persona cannot bind to itself".to_string(),
            ));
        }

        let (signature, target_signature) = match &claim.extra {
            Extra::TargetSignature {
                signature,
                target_signature,
            } => (signature.clone(), target_signature.clone()),
            _ => return Err(ValidationError::Missing("extra.target_signature")),
        };

        let payload = self.generate_sign_payload(claim)?;
        ensure_signed_by(payload.as_bytes(), &signature, &claim.persona)?;
        ensure_signed_by(payload.as_bytes(), &target_signature, &target)
            .map_err(|e| ValidationError::CoSignature(e.to_string()))?;

        claim.identity = target.to_wire();
        claim.signature = Some(signature);
        Ok(())
    }
}
