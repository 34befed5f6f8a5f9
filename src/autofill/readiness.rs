use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use super::SiteProfile;
use crate::dom::Document;
use crate::selector;

/// How long to wait for a page to show its form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    Ready { attempts: u32 },
    /// Budget spent without the check passing; filling goes ahead anyway
    Exhausted { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Run `check` until it passes or the attempt budget is spent, sleeping
/// `interval` between attempts. At least one attempt is always made.
pub async fn wait_until<F, Fut>(policy: ReadinessPolicy, mut check: F) -> Readiness
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let budget = policy.max_attempts.max(1);
    for attempt in 1..=budget {
        if check().await {
            return Readiness::Ready { attempts: attempt };
        }
        if attempt < budget {
            tokio::time::sleep(policy.interval).await;
        }
    }

    tracing::warn!("Page not ready after {} attempts, filling anyway", budget);
    Readiness::Exhausted { attempts: budget }
}

/// Every required field of `profile` resolves to an element
pub fn required_fields_present(doc: &Document, profile: &SiteProfile) -> bool {
    profile
        .required_fields()
        .all(|field| selector::resolve(doc, &field.selectors).is_some())
}
