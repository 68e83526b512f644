//! Proof endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::debug;

use super::{parse_created_at, parse_persona};
use crate::api::dto::{
    persona_wire, ExistsQuery, ExistsResponse, PayloadRequest, PayloadResponse, PersonaProofs,
    ProofQuery, ProofQueryResponse, ProofRecord, RestorePubkeyRequest, RestorePubkeyResponse,
    SubmitProofRequest,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::chain::is_stale;
use crate::crypto::{decode_signature, recover_personal};
use crate::payload::{build_sign_payload, Action, Claim, Extra, PayloadFields, Platform};
use crate::storage::ProofFilter;
use crate::validator::Validator;

/// Resolve a platform reachable through `/proof`.
fn proof_validator(state: &AppState, platform: &str) -> ApiResult<Arc<dyn Validator>> {
    let validator = state.engine.registry().resolve(platform)?;
    if validator.platform() == Platform::Kv {
        return Err(ApiError::Param("kv changes go through /kv".to_string()));
    }
    Ok(validator)
}

/// Build the post text and sign payload for a claim.
pub async fn payload(
    State(state): State<AppState>,
    Json(req): Json<PayloadRequest>,
) -> ApiResult<Json<PayloadResponse>> {
    let validator = proof_validator(&state, &req.platform)?;
    let action: Action = req.action.parse()?;
    let persona = parse_persona("public_key", &req.public_key)?;

    let mut claim = Claim::new(action, validator.platform(), req.identity, persona);
    claim.extra = Extra::from_request(req.extra.as_ref())?;
    state.engine.link_to_head(&mut claim).await?;

    let sign_payload = validator.generate_sign_payload(&claim)?;
    Ok(Json(PayloadResponse {
        post_content: validator.generate_post_payload(&claim).unwrap_or_default(),
        sign_payload,
        uuid: claim.uuid,
        created_at: claim.created_at.timestamp().to_string(),
    }))
}

/// Validate a claim and append it to the persona's chain.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitProofRequest>,
) -> ApiResult<StatusCode> {
    let validator = proof_validator(&state, &req.platform)?;
    let action: Action = req.action.parse()?;
    let persona = parse_persona("public_key", &req.public_key)?;

    let mut claim = Claim::new(action, validator.platform(), req.identity, persona);
    claim.proof_location = req.proof_location;
    claim.extra = Extra::from_request(req.extra.as_ref())?;
    claim.uuid = req.uuid;
    claim.created_at = parse_created_at(&req.created_at)?;
    state.engine.link_to_head(&mut claim).await?;

    state.engine.submit(claim).await?;
    Ok(StatusCode::CREATED)
}

/// Active bindings, by persona or by platform identity.
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<ProofQuery>,
) -> ApiResult<Json<ProofQueryResponse>> {
    let mut filter = ProofFilter::default();

    if let Some(public_key) = params.public_key.as_deref().filter(|s| !s.trim().is_empty()) {
        filter.persona = Some(parse_persona("public_key", public_key)?.to_hex());
    }
    if let Some(platform) = params.platform.as_deref().filter(|s| !s.trim().is_empty()) {
        let validator = state.engine.registry().resolve(platform)?;
        filter.platform = Some(validator.platform());
        if let Some(identity) = params.identity.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.identity = Some(validator.normalize_identity(identity)?);
        }
    }

    if filter.persona.is_none() && (filter.platform.is_none() || filter.identity.is_none()) {
        return Err(ApiError::Param(
            "either public_key or platform and identity are required".to_string(),
        ));
    }

    let proofs = state.engine.storage().query_proofs(&filter).await?;
    let mut grouped: BTreeMap<String, Vec<ProofRecord>> = BTreeMap::new();
    for proof in &proofs {
        grouped
            .entry(proof.persona.clone())
            .or_default()
            .push(ProofRecord::from(proof));
    }

    Ok(Json(ProofQueryResponse {
        ids: grouped
            .into_iter()
            .map(|(persona, proofs)| PersonaProofs {
                persona: persona_wire(&persona),
                proofs,
            })
            .collect(),
    }))
}

/// Status of one binding. Kicks off revalidation when stale.
pub async fn exists(
    State(state): State<AppState>,
    Query(params): Query<ExistsQuery>,
) -> ApiResult<Json<ExistsResponse>> {
    let validator = state.engine.registry().resolve(&params.platform)?;
    let identity = validator.normalize_identity(&params.identity)?;
    let persona = parse_persona("public_key", &params.public_key)?;

    let proof = state
        .engine
        .storage()
        .find_proof(&persona.to_hex(), validator.platform(), &identity)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no {} proof for {}", validator.platform(), identity))
        })?;

    if is_stale(&proof, Utc::now(), state.config.revalidate_after)
        && state.engine.spawn_revalidation(proof.clone()).is_some()
    {
        debug!("Proof {} is stale, revalidating", proof.id);
    }

    Ok(Json(ExistsResponse::from(&proof)))
}

/// Recover the signer of a claim without touching storage.
pub async fn restore_pubkey(
    State(state): State<AppState>,
    Json(req): Json<RestorePubkeyRequest>,
) -> ApiResult<Json<RestorePubkeyResponse>> {
    let validator = state.engine.registry().resolve(&req.platform)?;
    if validator.platform() == Platform::NextId {
        return Err(ApiError::Param(
            "nextid payloads name the signer; nothing to restore".to_string(),
        ));
    }

    let action: Action = req.action.parse()?;
    let signature = decode_signature(&req.signature)?;
    let previous = match req.previous.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(previous) => Some(decode_signature(previous)?),
        None => None,
    };
    let extra = match req.changes {
        Some(patch) => Extra::KvPatch(patch),
        None => Extra::from_request(req.extra.as_ref())?,
    };

    let identity = validator.normalize_identity(&req.identity)?;
    let fields = PayloadFields {
        action,
        platform: validator.platform(),
        identity: &identity,
        previous: previous.as_deref(),
        created_at: parse_created_at(&req.created_at)?.timestamp(),
        uuid: req.uuid,
        extra: extra.payload_fields()?,
    };
    let payload = build_sign_payload(&fields)?;
    let public_key = recover_personal(payload.as_bytes(), &signature)?;

    Ok(Json(RestorePubkeyResponse {
        public_key: public_key.to_wire(),
    }))
}
