use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::autofill::{FillReport, PageSession, SiteProfile};
use crate::dom::ControlSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub profiles: usize,
    pub pages: usize,
}

#[derive(Debug, Serialize)]
pub struct GenericResponse {
    pub status: String,
}

/// Short listing entry for a site profile
#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub host: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,
    pub storage_key: String,
    pub freshness_window_secs: u64,
    pub fields: Vec<String>,
}

impl From<&SiteProfile> for ProfileSummary {
    fn from(profile: &SiteProfile) -> Self {
        Self {
            host: profile.host.clone(),
            label: profile.label.clone(),
            entry_url: profile.entry_url.clone(),
            storage_key: profile.storage_key.clone(),
            freshness_window_secs: profile.freshness_window_secs,
            fields: profile.fields.iter().map(|f| f.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Serialize)]
pub struct MailboxPutResponse {
    pub key: String,
    pub ttl_secs: u64,
    pub expires_at: i64,
}

/// Live state of a registered page
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page_id: String,
    pub url: String,
    /// Label of the matching site profile, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub controls: Vec<ControlSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<FillReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageResponse {
    pub fn new(page: &PageSession, profile: Option<&SiteProfile>) -> Self {
        Self {
            page_id: page.id.clone(),
            url: page.url.to_string(),
            profile: profile.map(|p| p.label.clone()),
            controls: page.document.form_controls(),
            last_report: page.last_report.clone(),
            created_at: page.created_at,
            updated_at: page.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FrameMessageResponse {
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<FillReport>,
}

#[derive(Debug, Serialize)]
pub struct TrackAutomationResponse {
    pub task_id: String,
    pub status: String,
}
