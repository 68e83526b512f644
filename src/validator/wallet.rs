//! Wallet Co-Signed Platforms
//!
//! There is nothing to fetch: the wallet proves control by signing the
//! same payload as the persona.
//!
//! ```text
//! payload ──┬─► persona signature  (extra.signature)        == persona
//!           └─► wallet signature   (extra.wallet_signature) == identity
//! ```
//!
//! Ethereum wallets use personal-sign and are compared by address;
//! Solana wallets sign the raw payload bytes with ed25519.

use async_trait::async_trait;
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey as Ed25519Key};

use super::{validate_detached, ValidationError, Validator};
use crate::crypto::{ensure_signed_by, recover_personal};
use crate::payload::{Action, Claim, Extra, Platform};

/// Pull `(persona, wallet)` signatures out of a create claim.
fn wallet_signatures(claim: &Claim) -> Result<(Vec<u8>, Vec<u8>), ValidationError> {
    match &claim.extra {
        Extra::WalletSignature {
            signature,
            wallet_signature,
        } => Ok((signature.clone(), wallet_signature.clone())),
        _ => Err(ValidationError::Missing("extra.wallet_signature")),
    }
}

/// Ethereum wallets, identity = `0x` + 40 hex address.
#[derive(Debug, Default)]
pub struct EthereumValidator;

#[async_trait]
impl Validator for EthereumValidator {
    fn platform(&self) -> Platform {
        Platform::Ethereum
    }

    fn normalize_identity(&self, identity: &str) -> Result<String, ValidationError> {
        let trimmed = identity.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ValidationError::InvalidIdentity(format!("missing 0x: {}", identity)))?;

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidIdentity(format!(
                "not an address: {}",
                identity
            )));
        }
        Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
    }

    async fn validate(&self, claim: &mut Claim) -> Result<(), ValidationError> {
        match claim.action {
            Action::Create => {}
            Action::Delete => return validate_detached(self, claim),
            action => {
                return Err(ValidationError::UnsupportedAction {
                    platform: Platform::Ethereum,
                    action,
                })
            }
        }

        let identity = self.normalize_identity(&claim.identity)?;
        let (signature, wallet_signature) = wallet_signatures(claim)?;
        let payload = self.generate_sign_payload(claim)?;

        ensure_signed_by(payload.as_bytes(), &signature, &claim.persona)?;

        let wallet = recover_personal(payload.as_bytes(), &wallet_signature)
            .map_err(|e| ValidationError::CoSignature(e.to_string()))?;
        let address = wallet.address_hex();
        if address != identity {
            return Err(ValidationError::CoSignature(format!(
                "wallet signature is from {}, expect {}",
                address, identity
            )));
        }

        claim.identity = identity;
        claim.signature = Some(signature);
        Ok(())
    }
}

/// Solana wallets, identity = base58 ed25519 public key.
#[derive(Debug, Default)]
pub struct SolanaValidator;

impl SolanaValidator {
    fn wallet_key(identity: &str) -> Result<Ed25519Key, ValidationError> {
        let bytes = bs58::decode(identity)
            .into_vec()
            .map_err(|e| ValidationError::InvalidIdentity(format!("{}: {}", identity, e)))?;
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ValidationError::InvalidIdentity(format!("expect 32-byte key, got {} bytes", bytes.len()))
        })?;
        Ed25519Key::from_bytes(&bytes)
            .map_err(|e| ValidationError::InvalidIdentity(format!("{}: {}", identity, e)))
    }
}

#[async_trait]
impl Validator for SolanaValidator {
    fn platform(&self) -> Platform {
        Platform::Solana
    }

    /// Base58 is case-sensitive, so the address is only trimmed and checked.
    fn normalize_identity(&self, identity: &str) -> Result<String, ValidationError> {
        let trimmed = identity.trim();
        Self::wallet_key(trimmed)?;
        Ok(trimmed.to_string())
    }

    async fn validate(&self, claim: &mut Claim) -> Result<(), ValidationError> {
        match claim.action {
            Action::Create => {}
            Action::Delete => return validate_detached(self, claim),
            action => {
                return Err(ValidationError::UnsupportedAction {
                    platform: Platform::Solana,
                    action,
                })
            }
        }

        let identity = self.normalize_identity(&claim.identity)?;
        let key = Self::wallet_key(&identity)?;
        let (signature, wallet_signature) = wallet_signatures(claim)?;
        let payload = self.generate_sign_payload(claim)?;

        ensure_signed_by(payload.as_bytes(), &signature, &claim.persona)?;

        let wallet_signature = Ed25519Signature::from_slice(&wallet_signature)
            .map_err(|e| ValidationError::CoSignature(e.to_string()))?;
        key.verify_strict(payload.as_bytes(), &wallet_signature)
            .map_err(|e| ValidationError::CoSignature(format!("wallet signature rejected: {}", e)))?;

        claim.identity = identity;
        claim.signature = Some(signature);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
