use axum::{extract::State, Json};
use std::sync::Arc;

use super::super::state::AppState;
use crate::error::{AppError, Result};
use crate::models::HandoffRequest;
use crate::payload::{build_handoff, Handoff};

/// Put a payload into a transport for the receiving site and return the URL
/// the submitting page should open
pub async fn create_handoff(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HandoffRequest>,
) -> Result<Json<Handoff>> {
    let profile = state
        .profiles
        .for_host(&request.host)
        .ok_or_else(|| AppError::ProfileNotFound(request.host.clone()))?;

    if request.payload.is_empty() {
        return Err(AppError::ValidationError("Payload has no field values".to_string()));
    }

    let handoff = build_handoff(&profile, request.payload, request.transport, &state.mailbox)?;
    Ok(Json(handoff))
}
