//! In-memory storage.
//!
//! All tables sit behind one `RwLock`, so an append and its projection
//! are observed together or not at all. Used for development and tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{EntryPage, ProofFilter, ProofStorage, StorageError, StorageResult};
use crate::chain::{KvDocument, NewChainEntry, Proof, ProofChainEntry, Transition};
use crate::kv::apply_patch;
use crate::payload::Platform;

#[derive(Debug, Default)]
struct Tables {
    entries: BTreeMap<i64, ProofChainEntry>,
    /// persona -> newest entry id
    heads: HashMap<String, i64>,
    proofs: BTreeMap<i64, Proof>,
    kv: HashMap<String, KvDocument>,
    next_entry_id: i64,
    next_proof_id: i64,
}

impl Tables {
    fn project(&mut self, entry_id: i64, created_at: DateTime<Utc>, transition: Transition) {
        match transition {
            Transition::UpsertProof {
                persona,
                platform,
                identity,
                location,
                alt_id,
            } => {
                let existing = self.proofs.values_mut().find(|p| {
                    p.persona == persona
                        && p.platform == platform
                        && p.identity == identity
                        && p.location == location
                });

                match existing {
                    Some(proof) => {
                        proof.proof_chain_id = proof.proof_chain_id.max(entry_id);
                        if alt_id.is_some() {
                            proof.alt_id = alt_id;
                        }
                    }
                    None => {
                        self.next_proof_id += 1;
                        let id = self.next_proof_id;
                        self.proofs.insert(
                            id,
                            Proof {
                                id,
                                persona,
                                platform,
                                identity,
                                alt_id,
                                location,
                                is_valid: true,
                                invalid_reason: None,
                                last_checked_at: Utc::now(),
                                created_at,
                                proof_chain_id: entry_id,
                            },
                        );
                    }
                }
            }
            Transition::RemoveProofs {
                persona,
                platform,
                identity,
            } => {
                self.proofs.retain(|_, p| {
                    !(p.persona == persona && p.platform == platform && p.identity == identity)
                });
            }
            Transition::PatchKv { persona, patch } => {
                let content = apply_patch(self.kv.get(&persona).map(|doc| &doc.content), &patch);
                self.kv.insert(
                    persona.clone(),
                    KvDocument {
                        persona,
                        content,
                        updated_at: created_at,
                    },
                );
            }
        }
    }
}

/// In-memory [`ProofStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything (administrative reset).
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl ProofStorage for MemoryStorage {
    // ==================== Chain ====================

    async fn latest_entry(&self, persona: &str) -> StorageResult<Option<ProofChainEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .heads
            .get(persona)
            .and_then(|id| tables.entries.get(id))
            .cloned())
    }

    async fn find_entry_by_signature(
        &self,
        persona: &str,
        signature: &[u8],
    ) -> StorageResult<Option<ProofChainEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .values()
            .find(|e| e.persona == persona && e.signature == signature)
            .cloned())
    }

    async fn get_entry(&self, id: i64) -> StorageResult<Option<ProofChainEntry>> {
        Ok(self.tables.read().await.entries.get(&id).cloned())
    }

    async fn append_entry(
        &self,
        draft: NewChainEntry,
        transition: Transition,
    ) -> StorageResult<ProofChainEntry> {
        let mut tables = self.tables.write().await;

        let head = tables.heads.get(&draft.persona).copied();
        if head != draft.previous_id {
            return Err(StorageError::Conflict {
                persona: draft.persona,
                head,
                declared: draft.previous_id,
            });
        }

        tables.next_entry_id += 1;
        let entry = draft.into_entry(tables.next_entry_id);

        tables.heads.insert(entry.persona.clone(), entry.id);
        tables.entries.insert(entry.id, entry.clone());
        tables.project(entry.id, entry.created_at, transition);

        debug!("Appended entry {} for {}", entry.id, entry.persona);
        Ok(entry)
    }

    async fn project(&self, entry_id: i64, transition: Transition) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let created_at = tables
            .entries
            .get(&entry_id)
            .map(|e| e.created_at)
            .ok_or_else(|| StorageError::NotFound(format!("chain entry {}", entry_id)))?;
        tables.project(entry_id, created_at, transition);
        Ok(())
    }

    async fn list_entries(&self, persona: &str, page: usize, per: usize) -> StorageResult<EntryPage> {
        let tables = self.tables.read().await;
        let chain: Vec<&ProofChainEntry> =
            tables.entries.values().filter(|e| e.persona == persona).collect();

        let per = per.max(1);
        let skip = page.saturating_sub(1).saturating_mul(per);
        Ok(EntryPage {
            total: chain.len(),
            entries: chain.into_iter().skip(skip).take(per).cloned().collect(),
        })
    }

    // ==================== Proofs ====================

    async fn find_proof(
        &self,
        persona: &str,
        platform: Platform,
        identity: &str,
    ) -> StorageResult<Option<Proof>> {
        let tables = self.tables.read().await;
        Ok(tables
            .proofs
            .values()
            .rev()
            .find(|p| p.persona == persona && p.platform == platform && p.identity == identity)
            .cloned())
    }

    async fn query_proofs(&self, filter: &ProofFilter) -> StorageResult<Vec<Proof>> {
        let tables = self.tables.read().await;
        Ok(tables
            .proofs
            .values()
            .filter(|p| filter.persona.as_ref().map_or(true, |v| &p.persona == v))
            .filter(|p| filter.platform.map_or(true, |v| p.platform == v))
            .filter(|p| filter.identity.as_ref().map_or(true, |v| &p.identity == v))
            .cloned()
            .collect())
    }

    async fn update_proof_status(
        &self,
        proof_id: i64,
        is_valid: bool,
        invalid_reason: Option<String>,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let proof = tables
            .proofs
            .get_mut(&proof_id)
            .ok_or_else(|| StorageError::NotFound(format!("proof {}", proof_id)))?;
        proof.is_valid = is_valid;
        proof.invalid_reason = invalid_reason;
        proof.last_checked_at = checked_at;
        Ok(())
    }

    // ==================== KV ====================

    async fn get_kv(&self, persona: &str) -> StorageResult<Option<KvDocument>> {
        Ok(self.tables.read().await.kv.get(persona).cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================
