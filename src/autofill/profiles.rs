use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::applicator::OptionMatch;
use crate::payload::AutofillPayload;
use crate::selector::Selector;

const BUILTIN_PROFILES: &str = include_str!("builtin_profiles.json");

fn default_window_secs() -> u64 {
    600
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profiles file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid profile definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One logical field and the selectors that may locate it, best first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub selectors: Vec<Selector>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_match: Option<OptionMatch>,
}

/// Which query parameters must be present for the query source to count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTrigger {
    AnyOf(Vec<String>),
    AllOf(Vec<String>),
}

impl QueryTrigger {
    pub fn is_satisfied(&self, payload: &AutofillPayload) -> bool {
        match self {
            QueryTrigger::AnyOf(keys) => keys.iter().any(|k| payload.contains(k)),
            QueryTrigger::AllOf(keys) => keys.iter().all(|k| payload.contains(k)),
        }
    }
}

/// Field mappings for one external website
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Exact host name the profile applies to
    pub host: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,
    pub storage_key: String,
    #[serde(default = "default_window_secs")]
    pub freshness_window_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<QueryTrigger>,
    /// Lock submit buttons after a successful fill
    #[serde(default)]
    pub review_lock: bool,
    pub fields: Vec<FieldSpec>,
}

impl SiteProfile {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// `(name, default)` for every field that has a default
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.default.as_deref().map(|d| (f.name.as_str(), d)))
    }

    /// Whether query parameters parsed into `payload` count as a data source.
    /// Without an explicit rule any known field is enough.
    pub fn query_triggered(&self, payload: &AutofillPayload) -> bool {
        match &self.trigger {
            Some(trigger) => trigger.is_satisfied(payload),
            None => !payload.is_empty(),
        }
    }
}

/// Site profiles keyed by host
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<SiteProfile>>,
}

impl ProfileRegistry {
    /// Profiles for the supported government and utility portals
    pub fn builtin() -> Result<Self, ProfileError> {
        let mut registry = Self::default();
        registry.extend(parse_profiles(BUILTIN_PROFILES)?);
        Ok(registry)
    }

    /// Builtin profiles, overridden and extended by a JSON file if one is given
    pub fn load(extra: Option<&Path>) -> Result<Self, ProfileError> {
        let mut registry = Self::builtin()?;
        if let Some(path) = extra {
            let profiles = Self::read_file(path)?;
            tracing::info!("Loaded {} site profiles from {:?}", profiles.len(), path);
            registry.extend(profiles);
        }
        Ok(registry)
    }

    pub fn read_file(path: &Path) -> Result<Vec<SiteProfile>, ProfileError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_profiles(&raw)
    }

    /// Add or replace a profile
    pub fn insert(&mut self, mut profile: SiteProfile) {
        profile.host = profile.host.to_ascii_lowercase();
        if self.profiles.contains_key(&profile.host) {
            tracing::debug!("Replacing site profile for {}", profile.host);
        }
        self.profiles.insert(profile.host.clone(), Arc::new(profile));
    }

    pub fn extend(&mut self, profiles: impl IntoIterator<Item = SiteProfile>) {
        for profile in profiles {
            self.insert(profile);
        }
    }

    /// Exact host match
    pub fn for_host(&self, host: &str) -> Option<Arc<SiteProfile>> {
        self.profiles.get(&host.to_ascii_lowercase()).cloned()
    }

    pub fn for_url(&self, url: &Url) -> Option<Arc<SiteProfile>> {
        url.host_str().and_then(|host| self.for_host(host))
    }

    pub fn by_storage_key(&self, key: &str) -> Option<Arc<SiteProfile>> {
        self.profiles
            .values()
            .find(|p| p.storage_key == key)
            .cloned()
    }

    /// Every profile, sorted by host
    pub fn list(&self) -> Vec<Arc<SiteProfile>> {
        let mut all: Vec<_> = self.profiles.values().cloned().collect();
        all.sort_by(|a, b| a.host.cmp(&b.host));
        all
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn parse_profiles(raw: &str) -> Result<Vec<SiteProfile>, ProfileError> {
    Ok(serde_json::from_str(raw)?)
}
