use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::{canonical_field_name, now_millis, AutofillPayload, Mailbox};
use crate::autofill::SiteProfile;

/// Marker that introduces a payload in the URL fragment
const FRAGMENT_MARKER: &str = "autofill=";

/// Where a payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Query,
    Fragment,
    Mailbox,
    Prompt,
    /// Delivered directly by a frame message
    Message,
}

#[derive(Debug, Clone)]
pub struct ResolvedPayload {
    pub source: PayloadSource,
    pub payload: AutofillPayload,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} is required")]
    PromptAborted(String),
}

/// Asks the user for a field value in interactive mode.
/// `None` means the prompt was cancelled.
pub trait Prompter: Send {
    fn prompt(&mut self, label: &str, default: Option<&str>) -> Option<String>;
}

/// Looks for a payload in query parameters, then the fragment, then the
/// mailbox, then (when a prompter is given) by asking the user.
pub struct SourceResolver<'a> {
    profile: &'a SiteProfile,
    mailbox: &'a Mailbox,
    user_data_key: Option<&'a str>,
}

impl<'a> SourceResolver<'a> {
    pub fn new(profile: &'a SiteProfile, mailbox: &'a Mailbox) -> Self {
        Self {
            profile,
            mailbox,
            user_data_key: None,
        }
    }

    /// Also draw on the signed-in user's record stored under `key`. The
    /// handed-off payload is laid over it, and the record alone is enough
    /// to fill when nothing was handed off.
    pub fn with_user_data(mut self, key: Option<&'a str>) -> Self {
        self.user_data_key = key;
        self
    }

    /// First source that yields a payload wins. Malformed transports are
    /// logged and skipped; only an aborted prompt is an error.
    pub fn resolve(
        &self,
        page_url: &Url,
        prompter: Option<&mut dyn Prompter>,
    ) -> Result<Option<ResolvedPayload>, SourceError> {
        if let Some(payload) = self.from_query(page_url) {
            return Ok(Some(self.resolved(PayloadSource::Query, payload)));
        }
        if let Some(payload) = self.from_fragment(page_url) {
            return Ok(Some(self.resolved(PayloadSource::Fragment, payload)));
        }
        if let Some(payload) = self.from_mailbox() {
            return Ok(Some(self.resolved(PayloadSource::Mailbox, payload)));
        }
        if let Some(prompter) = prompter {
            let payload = self.from_prompt(prompter)?;
            return Ok(Some(self.resolved(PayloadSource::Prompt, payload)));
        }

        tracing::info!("No autofill data found for {}", self.profile.host);
        Ok(None)
    }

    fn resolved(&self, source: PayloadSource, payload: AutofillPayload) -> ResolvedPayload {
        tracing::info!(
            "Autofill payload for {} from {:?} ({} fields)",
            self.profile.host,
            source,
            payload.len()
        );
        ResolvedPayload { source, payload }
    }

    pub fn from_query(&self, page_url: &Url) -> Option<AutofillPayload> {
        let known = self.profile.field_names();
        let mut payload = AutofillPayload::new();
        for (key, value) in page_url.query_pairs() {
            let name = canonical_field_name(&key);
            if known.contains(&name.as_str()) {
                payload.insert(&name, &value);
            }
        }

        if !self.profile.query_triggered(&payload) {
            return None;
        }

        payload.merge_defaults(self.profile.defaults());
        Some(payload.stamped(now_millis()))
    }

    pub fn from_fragment(&self, page_url: &Url) -> Option<AutofillPayload> {
        let fragment = page_url.fragment()?;
        let (_, encoded) = fragment.split_once(FRAGMENT_MARKER)?;

        match decode_fragment(encoded) {
            Ok(payload) if !payload.is_empty() => Some(payload),
            Ok(_) => {
                tracing::warn!("Autofill fragment carried no usable fields");
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed autofill fragment: {}", e);
                None
            }
        }
    }

    pub fn from_mailbox(&self) -> Option<AutofillPayload> {
        let handed_off = self.mailbox.take_if_fresh(&self.profile.storage_key);
        let Some(mut merged) = self
            .user_data_key
            .and_then(|key| self.mailbox.peek_fresh(key))
        else {
            return handed_off;
        };

        if let Some(payload) = &handed_off {
            merged.overlay(payload);
        }
        tracing::debug!(
            "Merged user record with {} payload for {}",
            if handed_off.is_some() { "a handed-off" } else { "no" },
            self.profile.host
        );
        Some(merged)
    }

    fn from_prompt(&self, prompter: &mut dyn Prompter) -> Result<AutofillPayload, SourceError> {
        let mut payload = AutofillPayload::new();
        for field in &self.profile.fields {
            let answer = prompter
                .prompt(&field.label, field.default.as_deref())
                .map(|a| a.trim().to_string())
                .unwrap_or_default();

            if !answer.is_empty() {
                payload.insert(&field.name, &answer);
            } else if let Some(default) = &field.default {
                payload.insert(&field.name, default);
            } else if field.required {
                return Err(SourceError::PromptAborted(field.label.clone()));
            }
        }
        Ok(payload.stamped(now_millis()))
    }
}

/// Percent-decode, base64-decode, then JSON-parse a fragment payload
fn decode_fragment(encoded: &str) -> anyhow::Result<AutofillPayload> {
    let unescaped = urlencoding::decode(encoded.trim())?;
    let bytes = STANDARD.decode(unescaped.as_bytes())?;
    Ok(serde_json::from_slice(&bytes)?)
}
