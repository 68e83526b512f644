//! Revalidation
//!
//! A proof that has not been checked for a while is re-run through its
//! platform validator in the background. Only the proof row's freshness
//! flags change; the chain is never touched. Failures keep
//! `is_valid = false` with the most recent reason until a later run
//! succeeds.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::ChainEngine;
use super::entry::Proof;
use super::ChainError;
use crate::crypto::PublicKey;
use crate::payload::{Action, Claim};

/// Whether `proof` was last checked more than `threshold` before `now`.
pub fn is_stale(proof: &Proof, now: DateTime<Utc>, threshold: Duration) -> bool {
    match chrono::Duration::from_std(threshold) {
        Ok(threshold) => now.signed_duration_since(proof.last_checked_at) > threshold,
        Err(_) => false,
    }
}

impl ChainEngine {
    /// Re-check one proof and record the outcome. Returns the new validity.
    pub async fn revalidate(&self, proof: &Proof) -> Result<bool, ChainError> {
        let storage = self.storage();
        let origin = storage
            .get_entry(proof.proof_chain_id)
            .await?
            .ok_or_else(|| ChainError::MalformedEntry {
                id: Some(proof.proof_chain_id),
                reason: "proof refers to a missing chain entry".to_string(),
            })?;

        let previous = match origin.previous_id {
            Some(id) => Some(
                storage
                    .get_entry(id)
                    .await?
                    .ok_or_else(|| ChainError::MalformedEntry {
                        id: Some(origin.id),
                        reason: format!("previous entry {} is missing", id),
                    })?
                    .signature,
            ),
            None => None,
        };

        let mut claim = Claim {
            action: Action::Create,
            platform: origin.platform,
            identity: origin.identity.clone(),
            alt_id: origin.alt_id.clone(),
            proof_location: proof.location.clone(),
            persona: PublicKey::parse(&origin.persona)?,
            previous,
            created_at: origin.created_at,
            uuid: origin.uuid,
            extra: origin.extra.clone(),
            signature: None,
        };

        let validator = self.registry().get(origin.platform)?;
        let outcome = validator.validate(&mut claim).await;
        let (is_valid, reason) = match outcome {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };

        storage
            .update_proof_status(proof.id, is_valid, reason.clone(), Utc::now())
            .await?;

        match reason {
            None => debug!("Proof {} still valid", proof.id),
            Some(reason) => info!("Proof {} marked invalid: {}", proof.id, reason),
        }
        Ok(is_valid)
    }

    /// Fire-and-forget [`ChainEngine::revalidate`]. Errors are logged only.
    ///
    /// At most one run per proof is in flight; returns `None` when one
    /// already is.
    pub fn spawn_revalidation(&self, proof: Proof) -> Option<JoinHandle<()>> {
        let guard = InFlight::claim(&self.revalidating, proof.id)?;
        let engine = self.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = engine.revalidate(&proof).await {
                warn!("Revalidation of proof {} failed: {}", proof.id, e);
            }
        }))
    }
}

/// Membership of one proof id in the in-flight set, released on drop.
struct InFlight {
    set: Arc<Mutex<HashSet<i64>>>,
    id: i64,
}

impl InFlight {
    fn claim(set: &Arc<Mutex<HashSet<i64>>>, id: i64) -> Option<Self> {
        let inserted = set.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        if !inserted {
            debug!("Proof {} is already being revalidated", id);
            return None;
        }
        Some(Self {
            set: set.clone(),
            id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encode_b64;
    use crate::payload::Platform;
    use crate::storage::MemoryStorage;
    use crate::validator::source::{FetchedPost, MemorySource};
    use crate::validator::test_support::TestSigner;
    use crate::validator::source::{ContentSource, FetchRequest};
    use crate::validator::{ValidationError, ValidatorRegistry, SIGNATURE_PLACEHOLDER};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn proof_checked_at(last_checked_at: DateTime<Utc>) -> Proof {
        Proof {
            id: 1,
            persona: "02aa".to_string(),
            platform: Platform::Twitter,
            identity: "alice".to_string(),
            alt_id: None,
            location: "1".to_string(),
            is_valid: true,
            invalid_reason: None,
            last_checked_at,
            created_at: last_checked_at,
            proof_chain_id: 1,
        }
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let hour = Duration::from_secs(3600);
        assert!(!is_stale(&proof_checked_at(now - chrono::Duration::minutes(59)), now, hour));
        assert!(is_stale(&proof_checked_at(now - chrono::Duration::minutes(61)), now, hour));
    }

    #[tokio::test]
    async fn test_revalidate_tracks_removed_content() {
        let source = Arc::new(MemorySource::new());
        let registry = Arc::new(ValidatorRegistry::standard(source.clone()));
        let engine = ChainEngine::new(Arc::new(MemoryStorage::new()), registry);
        let signer = TestSigner::new(21);

        let mut claim = Claim::new(Action::Create, Platform::Twitter, "alice", signer.public_key());
        claim.proof_location = "77".to_string();
        let validator = engine.registry().get(Platform::Twitter).unwrap();
        let payload = validator.generate_sign_payload(&claim).unwrap();
        let text = validator.generate_post_payload(&claim).unwrap()["default"]
            .replace(SIGNATURE_PLACEHOLDER, &encode_b64(&signer.sign(&payload)));
        source
            .publish(Platform::Twitter, "77", FetchedPost::by("alice", text))
            .await;
        engine.submit(claim).await.unwrap();

        let persona = signer.public_key().to_hex();
        async fn find(engine: &ChainEngine, persona: &str) -> Proof {
            engine
                .storage()
                .find_proof(persona, Platform::Twitter, "alice")
                .await
                .unwrap()
                .unwrap()
        }

        assert!(engine.revalidate(&find(&engine, &persona).await).await.unwrap());

        source.unpublish(Platform::Twitter, "77").await;
        engine
            .spawn_revalidation(find(&engine, &persona).await)
            .unwrap()
            .await
            .unwrap();

        let proof = find(&engine, &persona).await;
        assert!(!proof.is_valid);
        assert!(proof.invalid_reason.unwrap().contains("external service unavailable"));

        // Chain untouched.
        let page = engine.storage().list_entries(&persona, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
    }

    /// Memory source that counts fetches and answers slowly.
    struct SlowSource {
        inner: MemorySource,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ContentSource for SlowSource {
        async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPost, ValidationError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.inner.fetch(request).await
        }
    }

    #[tokio::test]
    async fn test_one_revalidation_per_proof_in_flight() {
        let source = Arc::new(SlowSource {
            inner: MemorySource::new(),
            fetches: AtomicUsize::new(0),
        });
        let registry = Arc::new(ValidatorRegistry::standard(source.clone()));
        let engine = ChainEngine::new(Arc::new(MemoryStorage::new()), registry);
        let signer = TestSigner::new(22);

        let mut claim = Claim::new(Action::Create, Platform::Twitter, "alice", signer.public_key());
        claim.proof_location = "88".to_string();
        let validator = engine.registry().get(Platform::Twitter).unwrap();
        let payload = validator.generate_sign_payload(&claim).unwrap();
        let text = validator.generate_post_payload(&claim).unwrap()["default"]
            .replace(SIGNATURE_PLACEHOLDER, &encode_b64(&signer.sign(&payload)));
        source
            .inner
            .publish(Platform::Twitter, "88", FetchedPost::by("alice", text))
            .await;
        engine.submit(claim).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        let proof = engine
            .storage()
            .find_proof(&signer.public_key().to_hex(), Platform::Twitter, "alice")
            .await
            .unwrap()
            .unwrap();

        let handles: Vec<_> = (0..8)
            .filter_map(|_| engine.spawn_revalidation(proof.clone()))
            .collect();
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        // Released once finished.
        engine.spawn_revalidation(proof).unwrap().await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }
}
