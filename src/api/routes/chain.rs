//! Proof chain history endpoint

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};

use super::parse_persona;
use crate::api::dto::{ChainEntryRecord, ChainQuery, ChainResponse, Pagination};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// One page of a persona's chain, oldest first.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ChainQuery>,
) -> ApiResult<Json<ChainResponse>> {
    let persona = parse_persona("public_key", &params.public_key)?.to_hex();
    let per = state.config.page_size;
    let current = params.page.unwrap_or(1).max(1);

    let storage = state.engine.storage();
    let page = storage.list_entries(&persona, current, per).await?;

    // Previous signatures: from this page where possible, else from storage.
    let mut signatures: HashMap<i64, Vec<u8>> = page
        .entries
        .iter()
        .map(|e| (e.id, e.signature.clone()))
        .collect();
    let mut proof_chain = Vec::with_capacity(page.entries.len());
    for entry in &page.entries {
        let prev = match entry.previous_id {
            Some(id) => {
                if !signatures.contains_key(&id) {
                    if let Some(previous) = storage.get_entry(id).await? {
                        signatures.insert(id, previous.signature);
                    }
                }
                signatures.get(&id).map(Vec::as_slice)
            }
            None => None,
        };
        proof_chain.push(ChainEntryRecord::new(entry, prev));
    }

    let next = if current.saturating_mul(per) < page.total {
        current + 1
    } else {
        0
    };

    Ok(Json(ChainResponse {
        pagination: Pagination {
            total: page.total,
            per,
            current,
            next,
        },
        proof_chain,
    }))
}
