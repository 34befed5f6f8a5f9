//! Messages the browser-side shims send to fill a registered page.
//!
//! The extension popup sends `{action: "fillForm"}` and expects
//! `{success, filledCount}` back; an embedding portal page posts
//! `{type: "FILL_FORM", data}` with the payload inline.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::autofill::{
    required_fields_present, wait_until, ApplyMode, Autofill, FieldResult, FillOptions, FillReport,
    PageSession, ProfileRegistry, Readiness, ReadinessPolicy, SiteProfile,
};
use crate::payload::{AutofillPayload, Mailbox, PayloadSource, SourceResolver};

pub const FILL_FORM_TYPE: &str = "FILL_FORM";
pub const FILL_FORM_ACTION: &str = "fillForm";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<AutofillPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionRequest {
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionResponse {
    pub success: bool,
    #[serde(rename = "filledCount", skip_serializing_if = "Option::is_none")]
    pub filled_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExtensionResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            filled_count: None,
            message: Some(message.into()),
        }
    }

    fn from_report(report: &FillReport) -> Self {
        Self {
            success: report.is_success(),
            filled_count: Some(report.filled),
            message: (!report.is_success()).then(|| "No fields could be filled".to_string()),
        }
    }
}

/// Reply to an extension message and the fill it triggered, if any
#[derive(Debug, Clone)]
pub struct ExtensionReply {
    pub response: ExtensionResponse,
    pub report: Option<FillReport>,
}

impl From<ExtensionResponse> for ExtensionReply {
    fn from(response: ExtensionResponse) -> Self {
        Self {
            response,
            report: None,
        }
    }
}

/// Shared collaborators for message handling
#[derive(Clone)]
pub struct MessageContext<'a> {
    pub profiles: &'a ProfileRegistry,
    pub mailbox: &'a Mailbox,
    pub readiness: ReadinessPolicy,
    /// Tick of the typing animation used for frame messages
    pub typing_tick: Duration,
    /// Mailbox key of the user record merged into extension fills
    pub user_data_key: Option<&'a str>,
    pub progress: Option<mpsc::UnboundedSender<FieldResult>>,
}

impl MessageContext<'_> {
    fn autofill<'p>(&self, profile: &'p SiteProfile, options: FillOptions) -> Autofill<'p> {
        let autofill = Autofill::new(profile, options);
        match &self.progress {
            Some(tx) => autofill.with_progress(tx.clone()),
            None => autofill,
        }
    }
}

async fn wait_for_form(
    policy: ReadinessPolicy,
    page: &Mutex<PageSession>,
    profile: &SiteProfile,
) -> Readiness {
    wait_until(policy, move || async move {
        let session = page.lock().await;
        required_fields_present(&session.document, profile)
    })
    .await
}

/// Handle `{action: "fillForm"}` for a registered page: find the data the
/// portal left for this site, wait for the form, fill it.
pub async fn handle_extension_message(
    ctx: &MessageContext<'_>,
    page: &Mutex<PageSession>,
    request: &ExtensionRequest,
) -> ExtensionReply {
    if request.action != FILL_FORM_ACTION {
        return ExtensionResponse::failure(format!("Unknown action: {}", request.action)).into();
    }

    let url = page.lock().await.url.clone();
    let Some(profile) = ctx.profiles.for_url(&url) else {
        tracing::info!("No site profile for {}", url);
        return ExtensionResponse::failure("Site not supported").into();
    };

    let resolver = SourceResolver::new(&profile, ctx.mailbox).with_user_data(ctx.user_data_key);
    let resolved = match resolver.resolve(&url, None) {
        Ok(Some(resolved)) => resolved,
        Ok(None) | Err(_) => {
            return ExtensionResponse::failure(
                "No autofill data found. Please submit your application from the portal first",
            )
            .into()
        }
    };

    wait_for_form(ctx.readiness, page, &profile).await;

    let mut session = page.lock().await;
    let report = ctx
        .autofill(&profile, FillOptions::for_profile(&profile))
        .fill(
            &mut session.document,
            &resolved.payload,
            Some(resolved.source),
            None,
        )
        .await;
    session.record(report.clone());

    ExtensionReply {
        response: ExtensionResponse::from_report(&report),
        report: Some(report),
    }
}

/// Handle `{type: "FILL_FORM", data}`: type the values in and lock
/// submission for review. Other message types are ignored.
pub async fn handle_frame_message(
    ctx: &MessageContext<'_>,
    page: &Mutex<PageSession>,
    message: &FrameMessage,
) -> Option<FillReport> {
    if message.kind != FILL_FORM_TYPE {
        tracing::debug!("Ignoring frame message of type '{}'", message.kind);
        return None;
    }
    let payload = match &message.data {
        Some(data) if !data.is_empty() => data,
        _ => {
            tracing::warn!("FILL_FORM message carried no data");
            return None;
        }
    };

    let url = page.lock().await.url.clone();
    let Some(profile) = ctx.profiles.for_url(&url) else {
        tracing::info!("No site profile for {}", url);
        return None;
    };

    wait_for_form(ctx.readiness, page, &profile).await;

    let options = FillOptions {
        mode: ApplyMode::Typing {
            tick: ctx.typing_tick,
        },
        review_lock: true,
    };
    let mut session = page.lock().await;
    let report = ctx
        .autofill(&profile, options)
        .fill(&mut session.document, payload, Some(PayloadSource::Message), None)
        .await;
    session.record(report.clone());
    Some(report)
}
