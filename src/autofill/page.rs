use chrono::{DateTime, Utc};
use url::Url;

use super::orchestrator::FillReport;
use crate::dom::{parse_html, Document};

/// A page registered with the sidecar: its address and live document
#[derive(Debug, Clone)]
pub struct PageSession {
    pub id: String,
    pub url: Url,
    pub document: Document,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_report: Option<FillReport>,
}

impl PageSession {
    pub fn new(url: Url, html: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            document: parse_html(html),
            created_at: now,
            updated_at: now,
            last_report: None,
        }
    }

    /// Swap in new markup, e.g. after the page rendered its form
    pub fn replace_html(&mut self, html: &str) {
        self.document = parse_html(html);
        self.updated_at = Utc::now();
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn record(&mut self, report: FillReport) {
        self.updated_at = Utc::now();
        self.last_report = Some(report);
    }
}
