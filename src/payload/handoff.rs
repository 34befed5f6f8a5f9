use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::{expires_at, now_millis, AutofillPayload, Mailbox};
use crate::autofill::SiteProfile;

/// How the submitting page hands a payload to the receiving page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Query,
    #[serde(alias = "fragment")]
    Hash,
    #[default]
    Mailbox,
}

/// Where the submitting page should send the user
#[derive(Debug, Clone, Serialize)]
pub struct Handoff {
    pub url: String,
    pub transport: Transport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    /// Epoch millis after which a mailbox payload is no longer accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Site {0} has no entry URL")]
    NoEntryUrl(String),

    #[error("Invalid entry URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Put `payload` into `transport` for the site described by `profile` and
/// return the URL to open. A payload without a timestamp is stamped now.
pub fn build_handoff(
    profile: &SiteProfile,
    mut payload: AutofillPayload,
    transport: Transport,
    mailbox: &Mailbox,
) -> Result<Handoff, HandoffError> {
    let entry = profile
        .entry_url
        .as_deref()
        .ok_or_else(|| HandoffError::NoEntryUrl(profile.host.clone()))?;
    let mut url = Url::parse(entry)?;

    payload.stamp_if_missing();
    let mut handoff = Handoff {
        url: String::new(),
        transport,
        storage_key: None,
        expires_at: None,
    };

    match transport {
        Transport::Query => {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in payload.fields() {
                pairs.append_pair(name, value);
            }
        }
        Transport::Hash => {
            let json = serde_json::to_vec(&payload)?;
            let blob = STANDARD.encode(json);
            url.set_fragment(Some(&format!("autofill={}", urlencoding::encode(&blob))));
        }
        Transport::Mailbox => {
            let ttl = profile.freshness_window();
            let created = payload.timestamp().unwrap_or_else(now_millis);
            mailbox.put(&profile.storage_key, payload, ttl);
            handoff.storage_key = Some(profile.storage_key.clone());
            handoff.expires_at = Some(expires_at(created, ttl));
        }
    }

    handoff.url = url.to_string();
    tracing::info!("Handoff to {} via {:?}", profile.host, transport);
    Ok(handoff)
}
