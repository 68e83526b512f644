//! API route handlers

pub mod chain;
pub mod health;
pub mod kv;
pub mod proof;

use axum::{routing::get, routing::post, Router};

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::crypto::PublicKey;
use crate::payload::parse_timestamp;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(health::healthz))
        // Proofs
        .route("/proof/payload", post(proof::payload))
        .route("/proof", post(proof::submit).get(proof::query))
        .route("/proof/exists", get(proof::exists))
        .route("/proof/restore_pubkey", post(proof::restore_pubkey))
        // Proof chain
        .route("/proofchain", get(chain::list))
        // KV
        .route("/kv/payload", post(kv::payload))
        .route("/kv", post(kv::submit).get(kv::get))
        // State
        .with_state(state)
}

/// Parse a persona key from a request field.
fn parse_persona(field: &'static str, text: &str) -> ApiResult<PublicKey> {
    if text.trim().is_empty() {
        return Err(ApiError::Param(format!("{} is required", field)));
    }
    Ok(PublicKey::parse(text)?)
}

/// Parse an echoed `created_at`.
fn parse_created_at(text: &str) -> ApiResult<chrono::DateTime<chrono::Utc>> {
    Ok(parse_timestamp(text)?)
}
