//! Autofill payloads and the transports that carry them between pages.

mod handoff;
mod mailbox;
mod source;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

pub use handoff::{build_handoff, Handoff, HandoffError, Transport};
pub use mailbox::{Mailbox, MailboxEntry, DEFAULT_TTL};
pub use source::{PayloadSource, Prompter, ResolvedPayload, SourceError, SourceResolver};

/// Key under which the creation time travels in serialized payloads
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Alternate spellings used by the submitting pages, after snake-casing
const FIELD_ALIASES: [(&str, &str); 8] = [
    ("t_no", "t_number"),
    ("tno", "t_number"),
    ("provider", "discom"),
    ("consumer_no", "consumer_number"),
    ("name", "full_name"),
    ("survey_no", "survey_number"),
    ("phone", "mobile"),
    ("mobile_number", "mobile"),
];

fn camel_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel-case pattern is valid"))
}

/// Map a field name as sent by any submitting page onto its canonical form
pub fn canonical_field_name(name: &str) -> String {
    let snake = camel_boundary()
        .replace_all(name.trim(), "${1}_${2}")
        .to_ascii_lowercase()
        .replace(['-', ' '], "_");

    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == snake)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(snake)
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `window` in milliseconds, saturating at `i64::MAX`
pub fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// Epoch millis at which a payload created at `created` stops being fresh
pub fn expires_at(created: i64, window: Duration) -> i64 {
    created.saturating_add(window_millis(window))
}

/// Field values handed to a receiving page, plus when they were created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct AutofillPayload {
    fields: BTreeMap<String, String>,
    /// Epoch milliseconds
    timestamp: Option<i64>,
}

impl AutofillPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, canonicalizing names
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut payload = Self::new();
        for (k, v) in pairs {
            payload.insert(k.as_ref(), v.as_ref());
        }
        payload
    }

    /// Set a field; blank values are ignored
    pub fn insert(&mut self, name: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.fields.insert(canonical_field_name(name), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn stamped(mut self, at_millis: i64) -> Self {
        self.timestamp = Some(at_millis);
        self
    }

    /// Stamp with the current time unless the sender already did
    pub fn stamp_if_missing(&mut self) {
        if self.timestamp.is_none() {
            self.timestamp = Some(now_millis());
        }
    }

    /// Whether the payload is still inside `window` at `now_millis`.
    /// A payload without a timestamp is never fresh.
    pub fn is_fresh_at(&self, now_millis: i64, window: Duration) -> bool {
        match self.timestamp {
            Some(created) => now_millis.saturating_sub(created) <= window_millis(window),
            None => false,
        }
    }

    /// Fill absent fields from `defaults`
    pub fn merge_defaults<'a, I>(&mut self, defaults: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in defaults {
            if !self.contains(name) {
                self.insert(name, value);
            }
        }
    }

    /// Lay `other` over this payload: its fields replace ours, and its
    /// timestamp (when present) becomes ours
    pub fn overlay(&mut self, other: &AutofillPayload) {
        for (name, value) in &other.fields {
            self.fields.insert(name.clone(), value.clone());
        }
        if other.timestamp.is_some() {
            self.timestamp = other.timestamp;
        }
    }

    /// Keep only the named fields
    pub fn retain_fields(&mut self, keep: &[&str]) {
        self.fields.retain(|name, _| keep.contains(&name.as_str()));
    }
}

fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Suffix of the per-service account lists in portal user records
const ACCOUNT_LIST_SUFFIX: &str = "_accounts";

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl From<Map<String, Value>> for AutofillPayload {
    fn from(map: Map<String, Value>) -> Self {
        let mut payload = AutofillPayload::new();
        let mut accounts = Vec::new();
        for (key, value) in map {
            if key == TIMESTAMP_KEY {
                payload.timestamp = parse_timestamp(&value);
                continue;
            }
            match value {
                // Only the primary (first) account of each service is used
                Value::Array(list) if key.ends_with(ACCOUNT_LIST_SUFFIX) => {
                    if let Some(Value::Object(primary)) = list.into_iter().next() {
                        accounts.push(primary);
                    }
                }
                other => {
                    if let Some(text) = scalar_text(&other) {
                        payload.insert(&key, &text);
                    }
                }
            }
        }

        // Top-level values win over account records
        for account in accounts {
            for (key, value) in account {
                if payload.contains(&canonical_field_name(&key)) {
                    continue;
                }
                if let Some(text) = scalar_text(&value) {
                    payload.insert(&key, &text);
                }
            }
        }
        payload
    }
}

impl From<AutofillPayload> for Map<String, Value> {
    fn from(payload: AutofillPayload) -> Self {
        let mut map: Map<String, Value> = payload
            .fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        if let Some(ts) = payload.timestamp {
            map.insert(TIMESTAMP_KEY.to_string(), Value::from(ts));
        }
        map
    }
}
