//! KV endpoints
//!
//! `platform` is fixed to `kv` and `action` to `kv_set`; the identity is
//! the persona itself.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use super::{parse_created_at, parse_persona};
use crate::api::dto::{KvPayloadRequest, KvPayloadResponse, KvQuery, KvResponse, KvSubmitRequest};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::crypto::{decode_signature, PublicKey};
use crate::kv::KvPatch;
use crate::payload::{Action, Claim, Extra, Platform};

fn kv_claim(persona: PublicKey, changes: KvPatch) -> Claim {
    let mut claim = Claim::new(Action::KvSet, Platform::Kv, persona.to_wire(), persona);
    claim.extra = Extra::KvPatch(changes);
    claim
}

/// Build the sign payload for a patch.
pub async fn payload(
    State(state): State<AppState>,
    Json(req): Json<KvPayloadRequest>,
) -> ApiResult<Json<KvPayloadResponse>> {
    let persona = parse_persona("persona", &req.persona)?;
    let mut claim = kv_claim(persona, req.changes);
    state.engine.link_to_head(&mut claim).await?;

    let validator = state.engine.registry().get(Platform::Kv)?;
    Ok(Json(KvPayloadResponse {
        sign_payload: validator.generate_sign_payload(&claim)?,
        uuid: claim.uuid,
        created_at: claim.created_at.timestamp().to_string(),
    }))
}

/// Verify a signed patch, append it and merge it.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<KvSubmitRequest>,
) -> ApiResult<StatusCode> {
    let persona = parse_persona("persona", &req.persona)?;
    let mut claim = kv_claim(persona, req.changes);
    claim.uuid = req.uuid;
    claim.created_at = parse_created_at(&req.created_at)?;
    claim.signature = Some(decode_signature(&req.signature)?);
    state.engine.link_to_head(&mut claim).await?;

    state.engine.submit(claim).await?;
    Ok(StatusCode::CREATED)
}

/// A persona's current document; `{}` before the first patch.
pub async fn get(
    State(state): State<AppState>,
    Query(params): Query<KvQuery>,
) -> ApiResult<Json<KvResponse>> {
    let persona = parse_persona("persona", &params.persona)?.to_hex();
    let content = state
        .engine
        .storage()
        .get_kv(&persona)
        .await?
        .map(|doc| doc.content)
        .unwrap_or_else(|| json!({}));

    Ok(Json(KvResponse::new(&persona, content)))
}
