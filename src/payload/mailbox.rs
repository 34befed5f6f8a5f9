use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{now_millis, AutofillPayload};

/// Freshness window used when a writer does not name one
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Stored payload and the window it stays valid for
#[derive(Debug, Clone)]
pub struct MailboxEntry {
    pub payload: AutofillPayload,
    pub ttl: Duration,
}

impl MailboxEntry {
    pub fn is_fresh_at(&self, now_millis: i64) -> bool {
        self.payload.is_fresh_at(now_millis, self.ttl)
    }
}

/// Keyed single-consumer store for handing payloads to a receiving page.
///
/// `take_if_fresh` removes the entry before it looks at it, so of any number
/// of concurrent readers at most one ever receives a given payload, and a
/// stale entry is gone once anyone has looked.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    entries: Arc<DashMap<String, MailboxEntry>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload under `key`, replacing any previous one
    pub fn put(&self, key: &str, payload: AutofillPayload, ttl: Duration) {
        tracing::debug!("Mailbox put '{}' ({} fields, ttl {:?})", key, payload.len(), ttl);
        self.entries
            .insert(key.to_string(), MailboxEntry { payload, ttl });
    }

    pub fn take_if_fresh(&self, key: &str) -> Option<AutofillPayload> {
        self.take_if_fresh_at(key, now_millis())
    }

    /// Consume the entry under `key` if it is fresh at `now_millis`.
    /// The entry is deleted either way.
    pub fn take_if_fresh_at(&self, key: &str, now_millis: i64) -> Option<AutofillPayload> {
        let (_, entry) = self.entries.remove(key)?;

        if entry.payload.timestamp().is_none() {
            tracing::warn!("Discarding mailbox entry '{}' without a timestamp", key);
            return None;
        }
        if !entry.is_fresh_at(now_millis) {
            tracing::warn!("Discarding expired mailbox entry '{}' (ttl {:?})", key, entry.ttl);
            return None;
        }

        tracing::info!("Mailbox entry '{}' consumed", key);
        Some(entry.payload)
    }

    pub fn peek_fresh(&self, key: &str) -> Option<AutofillPayload> {
        self.peek_fresh_at(key, now_millis())
    }

    /// Copy of the entry under `key` if it is fresh at `now_millis`; the
    /// entry stays in place. Used for long-lived records such as a signed-in
    /// user's profile that several fills draw on.
    pub fn peek_fresh_at(&self, key: &str, now_millis: i64) -> Option<AutofillPayload> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now_millis))
            .map(|entry| entry.payload.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry that is stale at `now_millis`; returns how many went
    pub fn purge_stale_at(&self, now_millis: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh_at(now_millis));
        before.saturating_sub(self.entries.len())
    }
}
