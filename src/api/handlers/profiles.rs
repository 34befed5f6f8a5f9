use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::super::state::AppState;
use crate::autofill::SiteProfile;
use crate::error::{AppError, Result};
use crate::models::{ProfileSummary, ProfilesResponse};

/// List supported sites
pub async fn list_profiles(State(state): State<Arc<AppState>>) -> Json<ProfilesResponse> {
    let profiles = state
        .profiles
        .list()
        .iter()
        .map(|p| ProfileSummary::from(p.as_ref()))
        .collect();
    Json(ProfilesResponse { profiles })
}

/// Full field mapping for one host
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> Result<Json<SiteProfile>> {
    let profile = state
        .profiles
        .for_host(&host)
        .ok_or(AppError::ProfileNotFound(host))?;
    Ok(Json(profile.as_ref().clone()))
}
