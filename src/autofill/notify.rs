use serde::Serialize;
use std::time::Duration;

use super::orchestrator::FillReport;
use crate::dom::{Document, NodeId};
use crate::selector::Selector;

pub const NOTIFICATION_ID: &str = "autofill-notification";

/// Failure toasts list at most this many status lines
const MAX_FAILURE_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failure,
}

/// Transient on-page summary of a fill
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub lines: Vec<String>,
    #[serde(rename = "dismiss_after_ms", serialize_with = "as_millis")]
    pub dismiss_after: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl Notification {
    pub fn from_report(report: &FillReport) -> Self {
        if report.is_success() {
            let mut lines = vec![format!("Fields filled: {}", report.summary())];
            lines.extend(report.successes().map(|r| r.status_line()));
            lines.push("Please review and submit".to_string());
            Self {
                kind: NotificationKind::Success,
                title: "Auto-fill Completed!".to_string(),
                lines,
                dismiss_after: Duration::from_secs(5),
            }
        } else {
            let all = report.status_lines();
            let mut lines: Vec<String> = all.iter().take(MAX_FAILURE_LINES).cloned().collect();
            if all.len() > MAX_FAILURE_LINES {
                lines.push("...".to_string());
            }
            Self {
                kind: NotificationKind::Failure,
                title: "Auto-fill Failed".to_string(),
                lines,
                dismiss_after: Duration::from_secs(8),
            }
        }
    }

    /// Plain-text form used for blocking dialogs
    pub fn text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.lines.iter().map(|l| l.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Show the notification on the page, replacing an earlier one
    pub fn render_into(&self, doc: &mut Document) -> NodeId {
        if let Ok(previous) = Selector::parse(&format!("#{}", NOTIFICATION_ID)) {
            for node in previous.match_all(doc) {
                doc.remove(node);
            }
        }

        let (kind, background) = match self.kind {
            NotificationKind::Success => ("success", "#28a745"),
            NotificationKind::Failure => ("failure", "#dc3545"),
        };
        let dismiss = self.dismiss_after.as_millis().to_string();
        let body = doc.body();
        let toast = doc.create_element(
            body,
            "div",
            &[
                ("id", NOTIFICATION_ID),
                ("role", "status"),
                ("data-kind", kind),
                ("data-dismiss-after-ms", &dismiss),
            ],
        );
        for (property, value) in [
            ("position", "fixed"),
            ("top", "20px"),
            ("right", "20px"),
            ("z-index", "999999"),
            ("background", background),
            ("color", "white"),
        ] {
            doc.set_style(toast, property, value);
        }

        let title = doc.create_element(toast, "strong", &[]);
        doc.append_text(title, &self.title);
        for line in &self.lines {
            let row = doc.create_element(toast, "div", &[]);
            doc.append_text(row, line);
        }
        toast
    }
}
