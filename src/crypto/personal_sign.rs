//! Personal-Sign Scheme
//!
//! `hash = keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`
//!
//! Signatures are 65 bytes `r || s || v`. `v` is accepted as 0/1 or
//! 27/28 and normalized to 0/1 before recovery.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use super::keys::PublicKey;
use super::CryptoError;

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Prefix mixed into every personal-sign hash.
const PERSONAL_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Offset added to `v` by wallet software.
const LEGACY_V_OFFSET: u8 = 27;

/// Plain keccak256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Personal-sign digest of a message.
pub fn personal_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Sign a message with a local key. Output uses `v` in {27, 28}.
pub fn sign_personal(
    message: &[u8],
    key: &SigningKey,
) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
    let digest = personal_hash(message);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = recovery_id.to_byte() + LEGACY_V_OFFSET;
    Ok(out)
}

/// Recover the signer of a personal-sign signature.
pub fn recover_personal(message: &[u8], signature: &[u8]) -> Result<PublicKey, CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::SignatureLength {
            expected: SIGNATURE_LENGTH,
            actual: signature.len(),
        });
    }

    let recovery_id = normalize_recovery_id(signature[64])?;
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    let digest = personal_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(PublicKey::from(key))
}

/// Require that `signature` over `message` was made by `expected`.
pub fn ensure_signed_by(
    message: &[u8],
    signature: &[u8],
    expected: &PublicKey,
) -> Result<(), CryptoError> {
    let recovered = recover_personal(message, signature)?;
    if !recovered.matches(expected) {
        return Err(CryptoError::SignerMismatch {
            expected: expected.to_wire(),
            recovered: recovered.to_wire(),
        });
    }
    Ok(())
}

/// Boolean form of [`ensure_signed_by`]; malformed input is `false`.
pub fn verify_personal(message: &[u8], signature: &[u8], expected: &PublicKey) -> bool {
    ensure_signed_by(message, signature, expected).is_ok()
}

fn normalize_recovery_id(v: u8) -> Result<RecoveryId, CryptoError> {
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - LEGACY_V_OFFSET,
        other => return Err(CryptoError::InvalidRecoveryId(other)),
    };
    RecoveryId::from_byte(normalized).ok_or(CryptoError::InvalidRecoveryId(v))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key_from(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_personal_hash_prefix() {
        // keccak256("\x19Ethereum Signed Message:\n5hello")
        let mut manual = Vec::new();
        manual.extend_from_slice(b"\x19Ethereum Signed Message:\n5hello");
        assert_eq!(personal_hash(b"hello"), keccak256(&manual));
    }

    #[test]
    fn test_length_counts_bytes_not_chars() {
        let message = "héllo".as_bytes();
        let mut manual = b"\x19Ethereum Signed Message:\n6".to_vec();
        manual.extend_from_slice(message);
        assert_eq!(personal_hash(message), keccak256(&manual));
    }

    #[test]
    fn test_sign_recover() {
        let sk = key_from(3);
        let expected = PublicKey::from(sk.verifying_key());
        let sig = sign_personal(b"payload", &sk).unwrap();

        assert!(sig[64] == 27 || sig[64] == 28);
        let recovered = recover_personal(b"payload", &sig).unwrap();
        assert_eq!(recovered.to_hex(), expected.to_hex());
    }

    #[test]
    fn test_zero_based_v_accepted() {
        let sk = key_from(4);
        let expected = PublicKey::from(sk.verifying_key());
        let mut sig = sign_personal(b"payload", &sk).unwrap();
        sig[64] -= 27;

        assert!(verify_personal(b"payload", &sig, &expected));
    }

    #[test]
    fn test_bad_v_rejected() {
        let sk = key_from(5);
        let mut sig = sign_personal(b"payload", &sk).unwrap();
        sig[64] = 29;

        assert_eq!(
            recover_personal(b"payload", &sig),
            Err(CryptoError::InvalidRecoveryId(29))
        );
    }

    #[test]
    fn test_short_signature_reports_lengths() {
        let err = recover_personal(b"payload", &[0u8; 64]).unwrap_err();
        assert_eq!(err.to_string(), "signature length error: expect 65, got 64");
    }

    #[test]
    fn test_wrong_signer_mismatch() {
        let sig = sign_personal(b"payload", &key_from(6)).unwrap();
        let other = PublicKey::from(key_from(7).verifying_key());

        assert!(matches!(
            ensure_signed_by(b"payload", &sig, &other),
            Err(CryptoError::SignerMismatch { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_sign_verify_roundtrip(
            seed in proptest::array::uniform32(1u8..0x7f),
            message in "\\PC{0,64}",
        ) {
            let sk = SigningKey::from_slice(&seed).unwrap();
            let pk = PublicKey::from(sk.verifying_key());
            let sig = sign_personal(message.as_bytes(), &sk).unwrap();

            prop_assert!(verify_personal(message.as_bytes(), &sig, &pk));
        }

        #[test]
        fn prop_bit_flip_fails(
            seed in proptest::array::uniform32(1u8..0x7f),
            byte in 0usize..65,
            bit in 0u8..8,
        ) {
            let sk = SigningKey::from_slice(&seed).unwrap();
            let pk = PublicKey::from(sk.verifying_key());
            let mut sig = sign_personal(b"bind me", &sk).unwrap();
            sig[byte] ^= 1 << bit;

            prop_assert!(!verify_personal(b"bind me", &sig, &pk));
        }

        #[test]
        fn prop_changed_message_fails(
            seed in proptest::array::uniform32(1u8..0x7f),
            suffix in "\\PC{1,16}",
        ) {
            let sk = SigningKey::from_slice(&seed).unwrap();
            let pk = PublicKey::from(sk.verifying_key());
            let sig = sign_personal(b"bind me", &sk).unwrap();
            let changed = format!("bind me{}", suffix);

            prop_assert!(!verify_personal(changed.as_bytes(), &sig, &pk));
        }
    }
}
