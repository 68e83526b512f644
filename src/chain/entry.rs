//! Chain records and their materialized projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::crypto::encoding::b64;
use crate::payload::{Action, Extra, Platform};

/// One append-only log record.
///
/// `persona` is canonical compressed hex (no `0x`). `signature` covers
/// exactly `signature_payload`; the payload is kept for audit only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofChainEntry {
    /// Storage-assigned id, increasing in creation order.
    pub id: i64,
    /// Signing-session nonce.
    pub uuid: Uuid,
    /// Claim time.
    pub created_at: DateTime<Utc>,
    /// What the entry does.
    pub action: Action,
    /// Owning persona.
    pub persona: String,
    /// Normalized identity.
    pub identity: String,
    /// Platform.
    pub platform: Platform,
    /// Proof location.
    pub location: String,
    /// Platform-native id, if validation found one.
    pub alt_id: Option<String>,
    /// Persona signature.
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
    /// Exact signed string.
    pub signature_payload: String,
    /// Platform-specific extra.
    pub extra: Extra,
    /// Entry this one links to.
    pub previous_id: Option<i64>,
}

/// An entry about to be appended.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChainEntry {
    /// Signing-session nonce.
    pub uuid: Uuid,
    /// Claim time.
    pub created_at: DateTime<Utc>,
    /// What the entry does.
    pub action: Action,
    /// Owning persona (canonical hex).
    pub persona: String,
    /// Normalized identity.
    pub identity: String,
    /// Platform.
    pub platform: Platform,
    /// Proof location.
    pub location: String,
    /// Platform-native id.
    pub alt_id: Option<String>,
    /// Persona signature.
    pub signature: Vec<u8>,
    /// Exact signed string.
    pub signature_payload: String,
    /// Platform-specific extra.
    pub extra: Extra,
    /// Entry this one must link to. Must be the persona's current head.
    pub previous_id: Option<i64>,
}

impl NewChainEntry {
    /// Materialize with a storage-assigned id.
    pub fn into_entry(self, id: i64) -> ProofChainEntry {
        ProofChainEntry {
            id,
            uuid: self.uuid,
            created_at: self.created_at,
            action: self.action,
            persona: self.persona,
            identity: self.identity,
            platform: self.platform,
            location: self.location,
            alt_id: self.alt_id,
            signature: self.signature,
            signature_payload: self.signature_payload,
            extra: self.extra,
            previous_id: self.previous_id,
        }
    }
}

/// Current view of one active binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    /// Row id.
    pub id: i64,
    /// Owning persona (canonical hex).
    pub persona: String,
    /// Platform.
    pub platform: Platform,
    /// Normalized identity.
    pub identity: String,
    /// Platform-native id.
    pub alt_id: Option<String>,
    /// Proof location.
    pub location: String,
    /// Result of the last check.
    pub is_valid: bool,
    /// Why the last check failed.
    pub invalid_reason: Option<String>,
    /// When the proof was last checked.
    pub last_checked_at: DateTime<Utc>,
    /// When the binding was first projected.
    pub created_at: DateTime<Utc>,
    /// Chain entry that created (or last re-created) the binding.
    pub proof_chain_id: i64,
}

/// A persona's KV document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KvDocument {
    /// Owning persona (canonical hex).
    pub persona: String,
    /// Always a JSON object.
    pub content: Value,
    /// Last patch time.
    pub updated_at: DateTime<Utc>,
}
