use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::super::state::{AppState, WsEvent};
use crate::error::Result;
use crate::messaging::{
    handle_extension_message, handle_frame_message, ExtensionRequest, ExtensionResponse,
    FrameMessage,
};
use crate::models::FrameMessageResponse;

/// Wait until every field result has been broadcast, so `fill_complete`
/// always follows the last `fill_progress`
async fn flush_progress(forwarder: JoinHandle<()>) {
    if let Err(e) = forwarder.await {
        tracing::warn!("Progress forwarder failed: {}", e);
    }
}

/// Extension popup message (`{action: "fillForm"}`) for a registered page
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Json(request): Json<ExtensionRequest>,
) -> Result<Json<ExtensionResponse>> {
    let page = state.page(&page_id)?;

    let (ctx, progress) = state.message_context(&page_id);
    let reply = handle_extension_message(&ctx, &page, &request).await;
    drop(ctx);
    flush_progress(progress).await;

    match reply.report {
        Some(report) => state.broadcast(WsEvent::FillComplete { page_id, report }),
        None => {
            if let Some(message) = &reply.response.message {
                state.broadcast(WsEvent::Error {
                    page_id,
                    error: message.clone(),
                });
            }
        }
    }

    Ok(Json(reply.response))
}

/// Cross-frame message (`{type: "FILL_FORM", data}`) for a registered page
pub async fn post_frame_message(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Json(message): Json<FrameMessage>,
) -> Result<Json<FrameMessageResponse>> {
    let page = state.page(&page_id)?;

    let (ctx, progress) = state.message_context(&page_id);
    let report = handle_frame_message(&ctx, &page, &message).await;
    drop(ctx);
    flush_progress(progress).await;

    if let Some(report) = &report {
        state.broadcast(WsEvent::FillComplete {
            page_id,
            report: report.clone(),
        });
    }

    Ok(Json(FrameMessageResponse {
        handled: report.is_some(),
        report,
    }))
}
