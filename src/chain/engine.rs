//! Chain Engine
//!
//! Turns validated claims into chain entries.
//!
//! ```text
//! submit(claim)
//!   ├─► registry[platform].validate(claim)     (fills signature)
//!   ├─► previous sig ─► entry id               (ChainLinkNotFound)
//!   ├─► rebuild signature payload
//!   └─► storage.append_entry(draft, apply(draft))
//!          compare-and-append against head      (ChainConflict)
//! ```
//!
//! No lock is held across validation. Two submissions racing on the same
//! head both validate, and the store lets exactly one of them append.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument};

use super::apply::Transition;
use super::entry::{NewChainEntry, ProofChainEntry};
use super::ChainError;
use crate::crypto::{encode_b64, PublicKey};
use crate::payload::Claim;
use crate::storage::ProofStorage;
use crate::validator::ValidatorRegistry;

/// Chain linkage and apply engine.
#[derive(Clone)]
pub struct ChainEngine {
    storage: Arc<dyn ProofStorage>,
    registry: Arc<ValidatorRegistry>,
    /// Proof ids with a background revalidation running.
    pub(super) revalidating: Arc<Mutex<HashSet<i64>>>,
}

impl ChainEngine {
    /// Engine over a store and a validator registry.
    pub fn new(storage: Arc<dyn ProofStorage>, registry: Arc<ValidatorRegistry>) -> Self {
        Self {
            storage,
            registry,
            revalidating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Underlying store.
    pub fn storage(&self) -> &Arc<dyn ProofStorage> {
        &self.storage
    }

    /// Validator registry.
    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Most recent entry of a persona.
    pub async fn find_latest(&self, persona: &PublicKey) -> Result<Option<ProofChainEntry>, ChainError> {
        Ok(self.storage.latest_entry(&persona.to_hex()).await?)
    }

    /// Point `claim.previous` at the persona's current head.
    ///
    /// The HTTP handlers always call this, so clients never choose
    /// `previous` and [`ChainError::LinkNotFound`] only reaches library
    /// callers that set `previous` themselves before [`Self::create_entry`].
    pub async fn link_to_head(&self, claim: &mut Claim) -> Result<(), ChainError> {
        claim.previous = self.find_latest(&claim.persona).await?.map(|e| e.signature);
        Ok(())
    }

    /// Validate a claim, then append and project it.
    #[instrument(skip(self, claim), fields(platform = %claim.platform, action = %claim.action))]
    pub async fn submit(&self, mut claim: Claim) -> Result<ProofChainEntry, ChainError> {
        let validator = self.registry.get(claim.platform)?;
        validator.validate(&mut claim).await?;
        self.create_entry(&claim).await
    }

    /// Append a validated claim and project it, atomically.
    pub async fn create_entry(&self, claim: &Claim) -> Result<ProofChainEntry, ChainError> {
        let signature = claim.signature.clone().ok_or(ChainError::Unvalidated)?;
        let persona = claim.persona.to_hex();

        let previous_id = match claim.previous.as_deref().filter(|p| !p.is_empty()) {
            None => None,
            Some(previous) => {
                let linked = self
                    .storage
                    .find_entry_by_signature(&persona, previous)
                    .await?
                    .ok_or_else(|| ChainError::LinkNotFound(encode_b64(previous)))?;
                Some(linked.id)
            }
        };

        let validator = self.registry.get(claim.platform)?;
        let signature_payload = validator.generate_sign_payload(claim)?;

        let draft = NewChainEntry {
            uuid: claim.uuid,
            created_at: claim.created_at,
            action: claim.action,
            persona,
            identity: claim.identity.clone(),
            platform: claim.platform,
            location: claim.proof_location.clone(),
            alt_id: claim.alt_id.clone(),
            signature,
            signature_payload,
            extra: claim.extra.clone(),
            previous_id,
        };
        let transition = Transition::for_draft(&draft)?;
        let entry = self.storage.append_entry(draft, transition).await?;

        info!(
            "Chain entry {} appended: {} {}/{} for {}",
            entry.id, entry.action, entry.platform, entry.identity, entry.persona
        );
        Ok(entry)
    }

    /// Project a stored entry again. Idempotent.
    pub async fn apply(&self, entry: &ProofChainEntry) -> Result<(), ChainError> {
        let transition = Transition::for_entry(entry)?;
        self.storage.project(entry.id, transition).await?;
        debug!("Re-applied chain entry {}", entry.id);
        Ok(())
    }
}

impl std::fmt::Debug for ChainEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::kv::KvPatch;
    use crate::payload::{Action, Extra, Platform};
    use crate::storage::{MemoryStorage, ProofFilter};
    use crate::validator::source::{FetchedPost, MemorySource};
    use crate::validator::test_support::TestSigner;
    use crate::validator::{SIGNATURE_PLACEHOLDER, Validator};
    use rand::seq::SliceRandom;
    use serde_json::json;

    struct Harness {
        engine: ChainEngine,
        source: Arc<MemorySource>,
    }

    fn harness() -> Harness {
        let source = Arc::new(MemorySource::new());
        let registry = Arc::new(ValidatorRegistry::standard(source.clone()));
        let engine = ChainEngine::new(Arc::new(MemoryStorage::new()), registry);
        Harness { engine, source }
    }

    impl Harness {
        /// Build a twitter claim linked to the head and publish its proof.
        async fn twitter_claim(&self, signer: &TestSigner, handle: &str, location: &str) -> Claim {
            let mut claim = Claim::new(Action::Create, Platform::Twitter, handle, signer.public_key());
            claim.proof_location = location.to_string();
            self.engine.link_to_head(&mut claim).await.unwrap();

            let validator = self.engine.registry().get(Platform::Twitter).unwrap();
            let payload = validator.generate_sign_payload(&claim).unwrap();
            let post = validator.generate_post_payload(&claim).unwrap()["default"]
                .replace(SIGNATURE_PLACEHOLDER, &encode_b64(&signer.sign(&payload)));
            self.source
                .publish(Platform::Twitter, location, FetchedPost::by(handle, post))
                .await;
            claim
        }

        fn kv_claim(&self, signer: &TestSigner, patch: KvPatch, previous: Option<Vec<u8>>) -> Claim {
            let mut claim = Claim::new(
                Action::KvSet,
                Platform::Kv,
                signer.public_key().to_wire(),
                signer.public_key(),
            );
            claim.extra = Extra::KvPatch(patch);
            claim.previous = previous;
            let payload = crate::validator::KvValidator.generate_sign_payload(&claim).unwrap();
            claim.signature = Some(signer.sign(&payload));
            claim
        }
    }

    #[tokio::test]
    async fn test_chain_integrity() {
        let h = harness();
        let signer = TestSigner::new(11);

        let a = h.engine.submit(h.twitter_claim(&signer, "alice", "1").await).await.unwrap();
        assert_eq!(a.previous_id, None);

        let b = h.engine.submit(h.twitter_claim(&signer, "bob", "2").await).await.unwrap();
        assert_eq!(b.previous_id, Some(a.id));

        let latest = h.engine.find_latest(&signer.public_key()).await.unwrap().unwrap();
        assert_eq!(latest.id, b.id);
        assert!(latest.signature_payload.contains("\"prev\":\""));
    }

    #[tokio::test]
    async fn test_unknown_previous_is_link_not_found() {
        let h = harness();
        let signer = TestSigner::new(11);

        let claim = h.kv_claim(&signer, KvPatch::setting([("a", json!(1))]), Some(vec![7u8; 65]));
        let err = h.engine.submit(claim).await.unwrap_err();
        assert!(matches!(err, ChainError::LinkNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::ChainLinkNotFound);
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let h = harness();
        let signer = TestSigner::new(12);
        let entry = h.engine.submit(h.twitter_claim(&signer, "alice", "1").await).await.unwrap();

        h.engine.apply(&entry).await.unwrap();
        h.engine.apply(&entry).await.unwrap();

        let proofs = h
            .engine
            .storage()
            .query_proofs(&ProofFilter {
                persona: Some(signer.public_key().to_hex()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].proof_chain_id, entry.id);
    }

    #[tokio::test]
    async fn test_delete_removes_proof() {
        let h = harness();
        let signer = TestSigner::new(13);
        h.engine.submit(h.twitter_claim(&signer, "alice", "1").await).await.unwrap();

        let mut delete = Claim::new(Action::Delete, Platform::Twitter, "Alice", signer.public_key());
        h.engine.link_to_head(&mut delete).await.unwrap();
        let validator = h.engine.registry().get(Platform::Twitter).unwrap();
        let payload = validator.generate_sign_payload(&delete).unwrap();
        delete.extra = Extra::PersonaSignature {
            signature: signer.sign(&payload),
        };
        h.engine.submit(delete).await.unwrap();

        let proof = h
            .engine
            .storage()
            .find_proof(&signer.public_key().to_hex(), Platform::Twitter, "alice")
            .await
            .unwrap();
        assert!(proof.is_none());
    }

    #[tokio::test]
    async fn test_unvalidated_claim_rejected() {
        let h = harness();
        let signer = TestSigner::new(14);
        let claim = Claim::new(Action::Create, Platform::Twitter, "alice", signer.public_key());
        assert!(matches!(
            h.engine.create_entry(&claim).await,
            Err(ChainError::Unvalidated)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_forks_rejected() {
        let h = harness();
        let signer = TestSigner::new(15);
        let root = h.kv_claim(&signer, KvPatch::setting([("n", json!(0))]), None);
        let root = h.engine.submit(root).await.unwrap();

        // Many claims all linking to the same head.
        let mut claims: Vec<Claim> = (1..=8)
            .map(|n| h.kv_claim(&signer, KvPatch::setting([("n", json!(n))]), Some(root.signature.clone())))
            .collect();
        claims.shuffle(&mut rand::thread_rng());

        let tasks: Vec<_> = claims
            .into_iter()
            .map(|claim| {
                let engine = h.engine.clone();
                tokio::spawn(async move { engine.submit(claim).await })
            })
            .collect();

        let mut won = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(entry) => {
                    assert_eq!(entry.previous_id, Some(root.id));
                    won += 1;
                }
                Err(e) => {
                    assert_eq!(e.kind(), ErrorKind::ChainConflict);
                    conflicts += 1;
                }
            }
        }
        assert_eq!(won, 1);
        assert_eq!(conflicts, 7);

        let page = h
            .engine
            .storage()
            .list_entries(&signer.public_key().to_hex(), 1, 100)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }
}
