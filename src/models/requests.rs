use serde::Deserialize;
use std::collections::BTreeMap;

use crate::payload::{AutofillPayload, Transport};

/// Register a page the sidecar should fill
#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub url: String,
    pub html: String,
}

/// Replace a page's markup after it re-rendered
#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub html: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MailboxPutQuery {
    /// Freshness window; defaults to the owning profile's window
    pub ttl_secs: Option<u64>,
}

/// Submitting side: hand `payload` to the site at `host`
#[derive(Debug, Deserialize)]
pub struct HandoffRequest {
    pub host: String,
    pub payload: AutofillPayload,
    #[serde(default)]
    pub transport: Transport,
}

/// Track an automation task: either one already started (`task_id`) or a
/// new one of `kind` started here with `fields`
#[derive(Debug, Deserialize)]
pub struct TrackAutomationRequest {
    pub task_id: Option<String>,
    pub kind: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}
