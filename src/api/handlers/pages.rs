use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use super::super::state::AppState;
use crate::autofill::PageSession;
use crate::error::{AppError, Result};
use crate::models::{CreatePageRequest, GenericResponse, PageResponse, UpdatePageRequest};

fn page_response(state: &AppState, page: &PageSession) -> PageResponse {
    let profile = state.profiles.for_url(&page.url);
    PageResponse::new(page, profile.as_deref())
}

/// Register a page from its URL and markup
pub async fn create_page(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePageRequest>,
) -> Result<Json<PageResponse>> {
    let url = Url::parse(&request.url)
        .map_err(|e| AppError::ValidationError(format!("Invalid page URL '{}': {}", request.url, e)))?;

    let page = PageSession::new(url, &request.html);
    let response = page_response(&state, &page);
    tracing::info!("Registered page {} for {}", page.id, page.url);

    state
        .pages
        .insert(page.id.clone(), Arc::new(Mutex::new(page)));
    Ok(Json(response))
}

/// Replace a page's markup
pub async fn update_page(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Json(request): Json<UpdatePageRequest>,
) -> Result<Json<PageResponse>> {
    let page = state.page(&page_id)?;
    let mut session = page.lock().await;
    session.replace_html(&request.html);
    Ok(Json(page_response(&state, &session)))
}

pub async fn get_page(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<Json<PageResponse>> {
    let page = state.page(&page_id)?;
    let session = page.lock().await;
    Ok(Json(page_response(&state, &session)))
}

pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<Json<GenericResponse>> {
    state
        .pages
        .remove(&page_id)
        .ok_or(AppError::PageNotFound(page_id))?;
    Ok(Json(GenericResponse {
        status: "deleted".to_string(),
    }))
}
