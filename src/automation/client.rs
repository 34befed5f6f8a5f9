use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Automation backend is not configured")]
    NotConfigured,

    #[error("Automation backend rejected the task: {0}")]
    Rejected(String),

    #[error("Automation backend did not return a task id")]
    MissingTaskId,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Reply to `POST /automation/start-{kind}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    #[serde(other)]
    Unknown,
}

/// Reply to `GET /automation/status/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        self.status == TaskState::Completed
    }
}

/// External service that runs browser automation tasks
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    /// Submit a task of `kind` (e.g. "torrent-power") with flat field values
    async fn start(&self, kind: &str, fields: &BTreeMap<String, String>) -> Result<StartResponse>;

    /// Current status of a task
    async fn status(&self, task_id: &str) -> Result<TaskStatus>;

    /// Start a task and return its id, treating a refusal as an error
    async fn start_task(
        &self,
        kind: &str,
        fields: &BTreeMap<String, String>,
    ) -> std::result::Result<String, AutomationError> {
        let response = self.start(kind, fields).await?;
        if !response.success {
            return Err(AutomationError::Rejected(response.message));
        }
        response.task_id.ok_or(AutomationError::MissingTaskId)
    }
}

/// [`AutomationBackend`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpAutomationClient {
    client: Client,
    base_url: String,
}

impl HttpAutomationClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AutomationBackend for HttpAutomationClient {
    async fn start(&self, kind: &str, fields: &BTreeMap<String, String>) -> Result<StartResponse> {
        let url = format!("{}/automation/start-{}", self.base_url, kind);
        let res = self
            .client
            .post(&url)
            .json(fields)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("Automation start failed ({}): {}", status, body);
        }

        res.json()
            .await
            .context("Failed to parse automation start response")
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatus> {
        let url = format!(
            "{}/automation/status/{}",
            self.base_url,
            urlencoding::encode(task_id)
        );
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !res.status().is_success() {
            anyhow::bail!("Automation status failed: {}", res.status());
        }

        res.json()
            .await
            .context("Failed to parse automation status response")
    }
}
