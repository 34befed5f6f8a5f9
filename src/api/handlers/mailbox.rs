//! Mailbox endpoints: the submitting page stores a payload, the receiving
//! side takes it at most once.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use std::time::Duration;

use super::super::state::AppState;
use crate::error::{AppError, Result};
use crate::models::{MailboxPutQuery, MailboxPutResponse};
use crate::payload::{expires_at, AutofillPayload, DEFAULT_TTL};

/// Longest window a writer may ask for; a user record lives about a week
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Store a payload under `key`
pub async fn put_payload(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MailboxPutQuery>,
    Json(mut payload): Json<AutofillPayload>,
) -> Result<Json<MailboxPutResponse>> {
    if key.trim().is_empty() {
        return Err(AppError::ValidationError("Mailbox key cannot be empty".to_string()));
    }
    if payload.is_empty() {
        return Err(AppError::ValidationError("Payload has no field values".to_string()));
    }

    let ttl = match query.ttl_secs {
        Some(0) => {
            return Err(AppError::ValidationError("ttl_secs must be positive".to_string()));
        }
        Some(secs) if secs > MAX_TTL_SECS => {
            return Err(AppError::ValidationError(format!(
                "ttl_secs must not exceed {}",
                MAX_TTL_SECS
            )));
        }
        Some(secs) => Duration::from_secs(secs),
        None => state
            .profiles
            .by_storage_key(&key)
            .map(|p| p.freshness_window())
            .unwrap_or(DEFAULT_TTL),
    };

    payload.stamp_if_missing();
    let created = payload.timestamp().unwrap_or_default();
    state.mailbox.put(&key, payload, ttl);

    Ok(Json(MailboxPutResponse {
        key,
        ttl_secs: ttl.as_secs(),
        expires_at: expires_at(created, ttl),
    }))
}

/// Consume the payload under `key` if it is still fresh
pub async fn take_payload(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<AutofillPayload>> {
    state
        .mailbox
        .take_if_fresh(&key)
        .map(Json)
        .ok_or(AppError::PayloadNotFound(key))
}
