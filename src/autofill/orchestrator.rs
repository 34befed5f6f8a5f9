use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

use super::applicator::{self, ApplyMode, ApplyOutcome};
use super::lockdown::lock_submit_buttons;
use super::notify::Notification;
use super::{FieldSpec, SiteProfile};
use crate::dom::Document;
use crate::payload::{AutofillPayload, Mailbox, PayloadSource, Prompter, SourceError, SourceResolver};
use crate::selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Filled,
    /// No selector matched an element
    NotFound,
    /// The payload had no value for the field
    NoValue,
    NoMatchingOption,
    /// The element was found but could not be written
    Failed,
}

/// Outcome for one field
#[derive(Debug, Clone, Serialize)]
pub struct FieldResult {
    pub field: String,
    pub label: String,
    pub status: FieldStatus,
    /// Selector that located the element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FieldResult {
    fn new(spec: &FieldSpec, status: FieldStatus) -> Self {
        Self {
            field: spec.name.clone(),
            label: spec.label.clone(),
            status,
            selector: None,
            value: None,
            error: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.status == FieldStatus::Filled
    }

    /// Human-readable line for notifications and dialogs
    pub fn status_line(&self) -> String {
        let value = self.value.as_deref().unwrap_or_default();
        match self.status {
            FieldStatus::Filled => format!("✅ {}: {}", self.label, value),
            FieldStatus::NotFound => format!("❌ {} field not found", self.label),
            FieldStatus::NoValue => format!("❌ {} not found in payload", self.label),
            FieldStatus::NoMatchingOption => {
                format!("❌ {}: no option matching \"{}\"", self.label, value)
            }
            FieldStatus::Failed => format!(
                "❌ {}: {}",
                self.label,
                self.error.as_deref().unwrap_or("failed")
            ),
        }
    }
}

/// Result of one autofill pass over a page
#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PayloadSource>,
    pub results: Vec<FieldResult>,
    pub filled: usize,
    pub total: usize,
    pub locked_buttons: usize,
}

impl FillReport {
    pub fn new(host: &str, source: Option<PayloadSource>, results: Vec<FieldResult>) -> Self {
        Self {
            host: host.to_string(),
            source,
            filled: results.iter().filter(|r| r.is_filled()).count(),
            total: results.len(),
            results,
            locked_buttons: 0,
        }
    }

    /// `filled/total`, e.g. "4/5"
    pub fn summary(&self) -> String {
        format!("{}/{}", self.filled, self.total)
    }

    pub fn is_success(&self) -> bool {
        self.filled > 0
    }

    pub fn successes(&self) -> impl Iterator<Item = &FieldResult> {
        self.results.iter().filter(|r| r.is_filled())
    }

    pub fn status_lines(&self) -> Vec<String> {
        self.results.iter().map(|r| r.status_line()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.results.iter().find(|r| r.field == name)
    }
}

/// Blocking confirmation shown in interactive mode
pub trait Dialog: Send {
    fn alert(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    pub mode: ApplyMode,
    /// Lock submit buttons after a successful fill
    pub review_lock: bool,
}

impl FillOptions {
    pub fn for_profile(profile: &SiteProfile) -> Self {
        Self {
            mode: ApplyMode::Immediate,
            review_lock: profile.review_lock,
        }
    }
}

/// Fills one page from a payload according to a site profile
pub struct Autofill<'a> {
    profile: &'a SiteProfile,
    options: FillOptions,
    progress: Option<mpsc::UnboundedSender<FieldResult>>,
}

impl<'a> Autofill<'a> {
    pub fn new(profile: &'a SiteProfile, options: FillOptions) -> Self {
        Self {
            profile,
            options,
            progress: None,
        }
    }

    /// Report each field result on `tx` as soon as it is known
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<FieldResult>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Resolve a payload from the page's sources and fill with it.
    /// `Ok(None)` means no source had data; the page is left alone.
    pub async fn run(
        &self,
        doc: &mut Document,
        page_url: &Url,
        mailbox: &Mailbox,
        prompter: Option<&mut dyn Prompter>,
        mut dialog: Option<&mut dyn Dialog>,
    ) -> Result<Option<FillReport>, SourceError> {
        let resolved = match SourceResolver::new(self.profile, mailbox).resolve(page_url, prompter) {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return Ok(None),
            Err(e) => {
                if let Some(dialog) = dialog.as_deref_mut() {
                    dialog.alert(&e.to_string());
                }
                return Err(e);
            }
        };

        let report = self
            .fill(doc, &resolved.payload, Some(resolved.source), dialog)
            .await;
        Ok(Some(report))
    }

    /// Fill every profile field in order, then notify (and lock, if asked)
    pub async fn fill(
        &self,
        doc: &mut Document,
        payload: &AutofillPayload,
        source: Option<PayloadSource>,
        dialog: Option<&mut dyn Dialog>,
    ) -> FillReport {
        tracing::info!(
            "Autofilling {} fields on {}",
            self.profile.fields.len(),
            self.profile.host
        );

        let mut results = Vec::with_capacity(self.profile.fields.len());
        for spec in &self.profile.fields {
            let result = self.fill_field(doc, spec, payload).await;
            if let Some(tx) = &self.progress {
                let _ = tx.send(result.clone());
            }
            results.push(result);
        }

        let mut report = FillReport::new(&self.profile.host, source, results);
        if report.is_success() && self.options.review_lock {
            report.locked_buttons = lock_submit_buttons(doc);
        }

        let notification = Notification::from_report(&report);
        notification.render_into(doc);
        if let Some(dialog) = dialog {
            dialog.alert(&notification.text());
        }

        tracing::info!("Autofill on {} done: {}", self.profile.host, report.summary());
        report
    }

    async fn fill_field(
        &self,
        doc: &mut Document,
        spec: &FieldSpec,
        payload: &AutofillPayload,
    ) -> FieldResult {
        let Some(value) = payload.get(&spec.name) else {
            return FieldResult::new(spec, FieldStatus::NoValue);
        };
        let Some(target) = selector::resolve(doc, &spec.selectors) else {
            tracing::debug!("No element for '{}' on {}", spec.name, self.profile.host);
            return FieldResult::new(spec, FieldStatus::NotFound);
        };

        let option_match = spec.option_match.unwrap_or_default();
        let applied = match self.options.mode {
            ApplyMode::Immediate => applicator::apply(doc, target.node, value, option_match),
            ApplyMode::Typing { tick } => {
                applicator::apply_typed(doc, target.node, value, option_match, tick).await
            }
        };

        let mut result = FieldResult::new(spec, FieldStatus::Failed);
        result.selector = Some(target.selector.to_string());
        match applied {
            Ok(ApplyOutcome::Filled { written }) => {
                result.status = FieldStatus::Filled;
                result.value = Some(written);
            }
            Ok(ApplyOutcome::NoMatch) => {
                result.status = FieldStatus::NoMatchingOption;
                result.value = Some(value.to_string());
            }
            Err(e) => {
                tracing::warn!("Could not fill '{}' on {}: {}", spec.name, self.profile.host, e);
                result.error = Some(e.to_string());
            }
        }
        result
    }
}
