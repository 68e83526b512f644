//! Request and response bodies.
//!
//! Timestamps cross the wire as decimal epoch-second strings, the same
//! form the sign payload uses. Signatures are base64.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::chain::{Proof, ProofChainEntry};
use crate::crypto::encode_b64;
use crate::kv::KvPatch;
use crate::validator::PostContent;

fn epoch(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.timestamp().to_string()
}

/// Persona in wire form, from canonical hex.
pub(crate) fn persona_wire(hex: &str) -> String {
    format!("0x{}", hex)
}

// ==================== Proof ====================

/// `POST /proof/payload`
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRequest {
    /// `create` or `delete`.
    pub action: String,
    /// Platform name.
    pub platform: String,
    /// Identity on the platform.
    pub identity: String,
    /// Persona public key.
    pub public_key: String,
    /// Platform-specific extra.
    #[serde(default)]
    pub extra: Option<Value>,
}

/// Response of `POST /proof/payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadResponse {
    /// Text to publish, by locale. Empty when there is nothing to post.
    pub post_content: PostContent,
    /// Exact string to sign.
    pub sign_payload: String,
    /// Nonce to echo back on submit.
    pub uuid: Uuid,
    /// Timestamp to echo back on submit.
    pub created_at: String,
}

/// `POST /proof`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitProofRequest {
    /// `create` or `delete`.
    pub action: String,
    /// Platform name.
    pub platform: String,
    /// Identity on the platform.
    pub identity: String,
    /// Where the proof was published.
    #[serde(default)]
    pub proof_location: String,
    /// Persona public key.
    pub public_key: String,
    /// Platform-specific extra.
    #[serde(default)]
    pub extra: Option<Value>,
    /// Nonce from the payload response.
    pub uuid: Uuid,
    /// Timestamp from the payload response.
    pub created_at: String,
}

/// `GET /proof`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProofQuery {
    /// Platform name.
    pub platform: Option<String>,
    /// Identity on the platform.
    pub identity: Option<String>,
    /// Persona public key.
    pub public_key: Option<String>,
}

/// One proof in query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Platform name.
    pub platform: String,
    /// Identity on the platform.
    pub identity: String,
    /// Platform-native id.
    pub alt_id: String,
    /// Proof location.
    pub location: String,
    /// Binding time.
    pub created_at: String,
    /// Last check time.
    pub last_checked_at: String,
    /// Result of the last check.
    pub is_valid: bool,
    /// Why the last check failed.
    pub invalid_reason: String,
}

impl From<&Proof> for ProofRecord {
    fn from(proof: &Proof) -> Self {
        Self {
            platform: proof.platform.to_string(),
            identity: proof.identity.clone(),
            alt_id: proof.alt_id.clone().unwrap_or_default(),
            location: proof.location.clone(),
            created_at: epoch(&proof.created_at),
            last_checked_at: epoch(&proof.last_checked_at),
            is_valid: proof.is_valid,
            invalid_reason: proof.invalid_reason.clone().unwrap_or_default(),
        }
    }
}

/// Proofs of one persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProofs {
    /// Persona public key (wire form).
    pub persona: String,
    /// Active bindings.
    pub proofs: Vec<ProofRecord>,
}

/// Response of `GET /proof`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofQueryResponse {
    /// Matching personas.
    pub ids: Vec<PersonaProofs>,
}

/// `GET /proof/exists`
#[derive(Debug, Clone, Deserialize)]
pub struct ExistsQuery {
    /// Platform name.
    pub platform: String,
    /// Identity on the platform.
    pub identity: String,
    /// Persona public key.
    pub public_key: String,
}

/// Response of `GET /proof/exists`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResponse {
    /// Binding time.
    pub created_at: String,
    /// Last check time.
    pub last_checked_at: String,
    /// Result of the last check.
    pub is_valid: bool,
    /// Why the last check failed.
    pub invalid_reason: String,
}

impl From<&Proof> for ExistsResponse {
    fn from(proof: &Proof) -> Self {
        Self {
            created_at: epoch(&proof.created_at),
            last_checked_at: epoch(&proof.last_checked_at),
            is_valid: proof.is_valid,
            invalid_reason: proof.invalid_reason.clone().unwrap_or_default(),
        }
    }
}

/// `POST /proof/restore_pubkey`
#[derive(Debug, Clone, Deserialize)]
pub struct RestorePubkeyRequest {
    /// Claim action.
    pub action: String,
    /// Platform name.
    pub platform: String,
    /// Identity on the platform.
    pub identity: String,
    /// Claim nonce.
    pub uuid: Uuid,
    /// Claim timestamp.
    pub created_at: String,
    /// Base64 signature of the previous entry.
    #[serde(default)]
    pub previous: Option<String>,
    /// Base64 signature to recover from.
    pub signature: String,
    /// Platform-specific extra.
    #[serde(default)]
    pub extra: Option<Value>,
    /// KV patch, for `kv_set` claims.
    #[serde(default)]
    pub changes: Option<KvPatch>,
}

/// Response of `POST /proof/restore_pubkey`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorePubkeyResponse {
    /// Recovered signer (wire form).
    pub public_key: String,
}

// ==================== Proof chain ====================

/// `GET /proofchain`
#[derive(Debug, Clone, Deserialize)]
pub struct ChainQuery {
    /// Persona public key.
    pub public_key: String,
    /// 1-based page.
    #[serde(default)]
    pub page: Option<usize>,
}

/// Page position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Entries in the chain.
    pub total: usize,
    /// Entries per page.
    pub per: usize,
    /// This page.
    pub current: usize,
    /// Next page, 0 when this is the last.
    pub next: usize,
}

/// One chain entry as served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntryRecord {
    /// Claim action.
    pub action: String,
    /// Platform name.
    pub platform: String,
    /// Identity on the platform.
    pub identity: String,
    /// Platform-native id.
    pub alt_id: String,
    /// Proof location.
    pub proof_location: String,
    /// Claim time.
    pub created_at: String,
    /// Base64 persona signature.
    pub signature: String,
    /// Exact signed string.
    pub signature_payload: String,
    /// Base64 signature of the previous entry, if any.
    pub prev: Option<String>,
    /// Platform-specific extra, tagged by `kind`.
    pub extra: Value,
    /// Claim nonce.
    pub uuid: Uuid,
}

impl ChainEntryRecord {
    /// Render an entry; `prev` is the previous entry's signature.
    pub fn new(entry: &ProofChainEntry, prev: Option<&[u8]>) -> Self {
        Self {
            action: entry.action.to_string(),
            platform: entry.platform.to_string(),
            identity: entry.identity.clone(),
            alt_id: entry.alt_id.clone().unwrap_or_default(),
            proof_location: entry.location.clone(),
            created_at: epoch(&entry.created_at),
            signature: encode_b64(&entry.signature),
            signature_payload: entry.signature_payload.clone(),
            prev: prev.map(encode_b64),
            extra: serde_json::to_value(&entry.extra).unwrap_or(Value::Null),
            uuid: entry.uuid,
        }
    }
}

/// Response of `GET /proofchain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    /// Page position.
    pub pagination: Pagination,
    /// Entries on this page, oldest first.
    pub proof_chain: Vec<ChainEntryRecord>,
}

// ==================== KV ====================

/// `POST /kv/payload`
#[derive(Debug, Clone, Deserialize)]
pub struct KvPayloadRequest {
    /// Persona public key.
    pub persona: String,
    /// Patch to sign.
    pub changes: KvPatch,
}

/// Response of `POST /kv/payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvPayloadResponse {
    /// Exact string to sign.
    pub sign_payload: String,
    /// Nonce to echo back on submit.
    pub uuid: Uuid,
    /// Timestamp to echo back on submit.
    pub created_at: String,
}

/// `POST /kv`
#[derive(Debug, Clone, Deserialize)]
pub struct KvSubmitRequest {
    /// Persona public key.
    pub persona: String,
    /// Base64 persona signature over the payload.
    pub signature: String,
    /// Nonce from the payload response.
    pub uuid: Uuid,
    /// Timestamp from the payload response.
    pub created_at: String,
    /// Patch that was signed.
    pub changes: KvPatch,
}

/// `GET /kv`
#[derive(Debug, Clone, Deserialize)]
pub struct KvQuery {
    /// Persona public key.
    pub persona: String,
}

/// Response of `GET /kv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvResponse {
    /// Persona public key (wire form).
    pub persona: String,
    /// Current document.
    pub content: Value,
}

impl KvResponse {
    /// Document of a persona given in canonical hex.
    pub fn new(persona_hex: &str, content: Value) -> Self {
        Self {
            persona: persona_wire(persona_hex),
            content,
        }
    }
}

// ==================== Health ====================

/// Response of `GET /healthz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service greeting.
    pub hello: String,
    /// Server version.
    pub version: String,
}
