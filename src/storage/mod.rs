//! Persistence Collaborator
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    STORAGE                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ProofStorage  - what the chain engine needs from a store    │
//! │  MemoryStorage - single-process implementation               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Append contract
//!
//! `append_entry` is a compare-and-append: the draft's `previous_id` must
//! equal the persona's current head (`None` only for an empty chain).
//! Otherwise the call fails with [`StorageError::Conflict`] and nothing is
//! written. The entry insert and its projection commit together.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::chain::{KvDocument, NewChainEntry, Proof, ProofChainEntry, Transition};
use crate::error::ErrorKind;
use crate::payload::Platform;

pub use memory::MemoryStorage;

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Append did not link to the persona's head.
    #[error("chain head of {persona} is {head:?}, entry links to {declared:?}")]
    Conflict {
        /// Persona (canonical hex).
        persona: String,
        /// Current head entry id.
        head: Option<i64>,
        /// Id the draft declared as previous.
        declared: Option<i64>,
    },

    /// Referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::ChainConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Backend(_) => ErrorKind::Storage,
        }
    }
}

/// Proof row filter. `None` fields match anything.
#[derive(Clone, Debug, Default)]
pub struct ProofFilter {
    /// Persona (canonical hex).
    pub persona: Option<String>,
    /// Platform.
    pub platform: Option<Platform>,
    /// Normalized identity.
    pub identity: Option<String>,
}

/// One page of a persona's chain, oldest first.
#[derive(Clone, Debug)]
pub struct EntryPage {
    /// Entries on this page.
    pub entries: Vec<ProofChainEntry>,
    /// Entries in the whole chain.
    pub total: usize,
}

/// Persistence for chain entries and their projections.
#[async_trait]
pub trait ProofStorage: Send + Sync {
    // ==================== Chain ====================

    /// Most recent entry of a persona.
    async fn latest_entry(&self, persona: &str) -> StorageResult<Option<ProofChainEntry>>;

    /// Entry of a persona with exactly this signature.
    async fn find_entry_by_signature(
        &self,
        persona: &str,
        signature: &[u8],
    ) -> StorageResult<Option<ProofChainEntry>>;

    /// Entry by id.
    async fn get_entry(&self, id: i64) -> StorageResult<Option<ProofChainEntry>>;

    /// Compare-and-append, then project. Atomic.
    async fn append_entry(
        &self,
        draft: NewChainEntry,
        transition: Transition,
    ) -> StorageResult<ProofChainEntry>;

    /// Re-run the projection of an existing entry.
    async fn project(&self, entry_id: i64, transition: Transition) -> StorageResult<()>;

    /// Page `page` (1-based) of a persona's chain.
    async fn list_entries(&self, persona: &str, page: usize, per: usize) -> StorageResult<EntryPage>;

    // ==================== Proofs ====================

    /// Most recently created proof for a binding, any location.
    async fn find_proof(
        &self,
        persona: &str,
        platform: Platform,
        identity: &str,
    ) -> StorageResult<Option<Proof>>;

    /// Proofs matching a filter, ordered by id.
    async fn query_proofs(&self, filter: &ProofFilter) -> StorageResult<Vec<Proof>>;

    /// Record a revalidation outcome.
    async fn update_proof_status(
        &self,
        proof_id: i64,
        is_valid: bool,
        invalid_reason: Option<String>,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ==================== KV ====================

    /// A persona's KV document.
    async fn get_kv(&self, persona: &str) -> StorageResult<Option<KvDocument>>;
}
