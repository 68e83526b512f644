//! Apply: Entry → Projection Effect
//!
//! ```text
//! Create ─► UpsertProof  (key: persona, platform, identity, location)
//! Delete ─► RemoveProofs (persona, platform, identity; no match is fine)
//! KvSet  ─► PatchKv      (set first, then del)
//! ```
//!
//! Computing the transition is pure. Storage performs it in the same
//! critical section as the append, and performing it twice changes
//! nothing the first time did not.

use super::entry::{NewChainEntry, ProofChainEntry};
use super::ChainError;
use crate::kv::KvPatch;
use crate::payload::{Action, Extra, Platform};

/// Effect of one chain entry on the materialized views.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Insert the proof row, or refresh its chain reference if present.
    UpsertProof {
        /// Persona (canonical hex).
        persona: String,
        /// Platform.
        platform: Platform,
        /// Normalized identity.
        identity: String,
        /// Proof location.
        location: String,
        /// Platform-native id.
        alt_id: Option<String>,
    },
    /// Remove every proof row for the binding.
    RemoveProofs {
        /// Persona (canonical hex).
        persona: String,
        /// Platform.
        platform: Platform,
        /// Normalized identity.
        identity: String,
    },
    /// Merge a patch into the persona's KV document.
    PatchKv {
        /// Persona (canonical hex).
        persona: String,
        /// Patch to merge.
        patch: KvPatch,
    },
}

impl Transition {
    /// Transition for an entry about to be appended.
    pub fn for_draft(draft: &NewChainEntry) -> Result<Self, ChainError> {
        derive(
            None,
            draft.action,
            &draft.persona,
            draft.platform,
            &draft.identity,
            &draft.location,
            &draft.alt_id,
            &draft.extra,
        )
    }

    /// Transition for a stored entry.
    pub fn for_entry(entry: &ProofChainEntry) -> Result<Self, ChainError> {
        derive(
            Some(entry.id),
            entry.action,
            &entry.persona,
            entry.platform,
            &entry.identity,
            &entry.location,
            &entry.alt_id,
            &entry.extra,
        )
    }

    /// Persona the transition touches.
    pub fn persona(&self) -> &str {
        match self {
            Self::UpsertProof { persona, .. }
            | Self::RemoveProofs { persona, .. }
            | Self::PatchKv { persona, .. } => persona,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn derive(
    id: Option<i64>,
    action: Action,
    persona: &str,
    platform: Platform,
    identity: &str,
    location: &str,
    alt_id: &Option<String>,
    extra: &Extra,
) -> Result<Transition, ChainError> {
    match action {
        Action::Create => Ok(Transition::UpsertProof {
            persona: persona.to_string(),
            platform,
            identity: identity.to_string(),
            location: location.to_string(),
            alt_id: alt_id.clone(),
        }),
        Action::Delete => Ok(Transition::RemoveProofs {
            persona: persona.to_string(),
            platform,
            identity: identity.to_string(),
        }),
        Action::KvSet => match extra {
            Extra::KvPatch(patch) => Ok(Transition::PatchKv {
                persona: persona.to_string(),
                patch: patch.clone(),
            }),
            _ => Err(ChainError::MalformedEntry {
                id,
                reason: "kv_set entry without a patch".to_string(),
            }),
        },
    }
}
