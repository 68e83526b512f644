//! Proof Chain
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF CHAIN                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  entry.rs      - Log records and projected views             │
//! │  apply.rs      - Entry -> Transition (pure)                  │
//! │  engine.rs     - Find-latest, create + apply, re-apply       │
//! │  revalidate.rs - Background freshness checks                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each persona owns a linear chain. Entries link by the *signature* of
//! their predecessor, so the chain is hash-linked rather than numbered:
//!
//! ```text
//!   [create twitter] ◄── prev=sig₁ ── [kv_set] ◄── prev=sig₂ ── [delete twitter]
//! ```

pub mod apply;
pub mod engine;
pub mod entry;
pub mod revalidate;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::error::ErrorKind;
use crate::payload::PayloadError;
use crate::storage::StorageError;
use crate::validator::ValidationError;

pub use apply::Transition;
pub use engine::ChainEngine;
pub use entry::{KvDocument, NewChainEntry, Proof, ProofChainEntry};
pub use revalidate::is_stale;

/// Chain engine errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Declared previous signature matches no entry of the persona.
    #[error("chain link not found: no entry with signature {0}")]
    LinkNotFound(String),

    /// Previous entry is no longer the persona's head.
    #[error("chain conflict: {0}")]
    Conflict(StorageError),

    /// Claim reached the engine without a validated signature.
    #[error("claim has not been validated")]
    Unvalidated,

    /// Stored entry cannot be interpreted.
    #[error("malformed chain entry {id:?}: {reason}")]
    MalformedEntry {
        /// Entry id, when stored.
        id: Option<i64>,
        /// What is wrong.
        reason: String,
    },

    /// Validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Payload could not be rebuilt.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Key or signature decoding failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ChainError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict { .. } => Self::Conflict(e),
            other => Self::Storage(other),
        }
    }
}

impl ChainError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LinkNotFound(_) => ErrorKind::ChainLinkNotFound,
            Self::Conflict(_) => ErrorKind::ChainConflict,
            Self::Unvalidated => ErrorKind::InvalidSignature,
            Self::MalformedEntry { .. } => ErrorKind::Storage,
            Self::Validation(e) => e.kind(),
            Self::Payload(e) => e.kind(),
            Self::Crypto(e) => e.kind(),
            Self::Storage(e) => e.kind(),
        }
    }
}
