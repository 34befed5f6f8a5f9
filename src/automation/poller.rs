use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::client::{AutomationBackend, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    /// Hard cap on status requests; derived from the timeout when unset
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(300),
            max_polls: None,
        }
    }
}

impl PollPolicy {
    pub fn poll_budget(&self) -> u32 {
        self.max_polls.unwrap_or_else(|| {
            let interval = self.interval.as_millis().max(1);
            let polls = self.timeout.as_millis().div_ceil(interval);
            u32::try_from(polls).unwrap_or(u32::MAX).max(1)
        })
    }
}

/// Why polling stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Completed { status: TaskStatus, polls: u32 },
    TransportError { error: String, polls: u32 },
    PollLimit { polls: u32 },
    TimedOut { polls: u32 },
}

impl PollOutcome {
    pub fn polls(&self) -> u32 {
        match self {
            PollOutcome::Completed { polls, .. }
            | PollOutcome::TransportError { polls, .. }
            | PollOutcome::PollLimit { polls }
            | PollOutcome::TimedOut { polls } => *polls,
        }
    }
}

/// Poll a task until it completes, a request fails, the poll budget is
/// spent, or the timeout passes. Every status seen goes to `on_status`.
pub async fn poll_until_complete<B, F>(
    backend: &B,
    task_id: &str,
    policy: PollPolicy,
    mut on_status: F,
) -> PollOutcome
where
    B: AutomationBackend + ?Sized,
    F: FnMut(&TaskStatus),
{
    let started = Instant::now();
    let budget = policy.poll_budget();
    let mut polls = 0;

    loop {
        polls += 1;
        let status = match backend.status(task_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Status poll for task {} failed: {:#}", task_id, e);
                return PollOutcome::TransportError {
                    error: format!("{:#}", e),
                    polls,
                };
            }
        };

        tracing::debug!("Task {} status {:?} (poll {})", task_id, status.status, polls);
        on_status(&status);

        if status.is_completed() {
            tracing::info!("Task {} completed after {} polls", task_id, polls);
            return PollOutcome::Completed { status, polls };
        }
        if polls >= budget {
            tracing::warn!("Task {} still not complete after {} polls", task_id, polls);
            return PollOutcome::PollLimit { polls };
        }
        let next_poll = started.elapsed().checked_add(policy.interval);
        if next_poll.map_or(true, |at| at > policy.timeout) {
            tracing::warn!("Task {} timed out after {:?}", task_id, policy.timeout);
            return PollOutcome::TimedOut { polls };
        }

        tokio::time::sleep(policy.interval).await;
    }
}
