use axum::{extract::State, Json};
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Instant;

use super::super::state::{AppState, WsEvent};
use crate::automation::{poll_until_complete, AutomationError};
use crate::error::{AppError, Result};
use crate::models::{TrackAutomationRequest, TrackAutomationResponse};

/// Start (or adopt) an automation task and poll it in the background.
/// Status updates and the final outcome go out over the WebSocket.
pub async fn track_automation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackAutomationRequest>,
) -> Result<Json<TrackAutomationResponse>> {
    let backend = state
        .automation
        .clone()
        .ok_or(AutomationError::NotConfigured)?;

    let task_id = match (request.task_id, request.kind) {
        (Some(task_id), _) if !task_id.trim().is_empty() => task_id,
        (_, Some(kind)) if !kind.trim().is_empty() => {
            backend.start_task(&kind, &request.fields).await?
        }
        _ => {
            return Err(AppError::ValidationError(
                "Either task_id or kind is required".to_string(),
            ))
        }
    };

    match state.tracked_tasks.entry(task_id.clone()) {
        Entry::Occupied(_) => {
            return Ok(Json(TrackAutomationResponse {
                task_id,
                status: "already_tracking".to_string(),
            }));
        }
        Entry::Vacant(slot) => {
            slot.insert(Instant::now());
        }
    }

    let policy = state.config.poll_policy();
    let state_clone = state.clone();
    let id = task_id.clone();
    tokio::spawn(async move {
        let outcome = poll_until_complete(backend.as_ref(), &id, policy, |status| {
            state_clone.broadcast(WsEvent::AutomationStatus {
                task_id: id.clone(),
                status: status.clone(),
            });
        })
        .await;

        if let Some((_, started)) = state_clone.tracked_tasks.remove(&id) {
            tracing::info!(
                "Stopped tracking task {} after {:?} ({} polls)",
                id,
                started.elapsed(),
                outcome.polls()
            );
        }
        state_clone.broadcast(WsEvent::AutomationFinished {
            task_id: id,
            outcome,
        });
    });

    Ok(Json(TrackAutomationResponse {
        task_id,
        status: "tracking".to_string(),
    }))
}
