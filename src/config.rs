use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::autofill::ReadinessPolicy;
use crate::automation::PollPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Extra or overriding site profiles (JSON array)
    pub profiles_path: Option<PathBuf>,
    pub ready_interval: Duration,
    pub ready_attempts: u32,
    pub typing_tick: Duration,
    /// Mailbox key of the signed-in user's record merged into extension fills
    pub user_data_key: Option<String>,
    pub automation_base_url: Option<String>,
    pub automation_poll_interval: Duration,
    pub automation_timeout: Duration,
}

/// Upper bound for every configured interval and timeout
pub const MAX_CONFIGURED_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

fn clamped(key: &str, value: Duration) -> Duration {
    if value > MAX_CONFIGURED_DURATION {
        tracing::warn!("{} too large, clamping to {:?}", key, MAX_CONFIGURED_DURATION);
        MAX_CONFIGURED_DURATION
    } else {
        value
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed("PORT").unwrap_or(defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            profiles_path: non_empty("AUTOFILL_PROFILES_PATH").map(PathBuf::from),
            ready_interval: parsed("AUTOFILL_READY_INTERVAL_MS")
                .map(|ms| clamped("AUTOFILL_READY_INTERVAL_MS", Duration::from_millis(ms)))
                .unwrap_or(defaults.ready_interval),
            ready_attempts: parsed("AUTOFILL_READY_ATTEMPTS").unwrap_or(defaults.ready_attempts),
            typing_tick: parsed("AUTOFILL_TYPING_TICK_MS")
                .map(|ms| clamped("AUTOFILL_TYPING_TICK_MS", Duration::from_millis(ms)))
                .unwrap_or(defaults.typing_tick),
            user_data_key: match env::var("AUTOFILL_USER_DATA_KEY") {
                // Set but empty turns the merge off
                Ok(key) => Some(key.trim().to_string()).filter(|k| !k.is_empty()),
                Err(_) => defaults.user_data_key,
            },
            automation_base_url: non_empty("AUTOMATION_BASE_URL"),
            automation_poll_interval: parsed("AUTOMATION_POLL_INTERVAL_SECS")
                .map(|secs| clamped("AUTOMATION_POLL_INTERVAL_SECS", Duration::from_secs(secs)))
                .unwrap_or(defaults.automation_poll_interval),
            automation_timeout: parsed("AUTOMATION_TIMEOUT_SECS")
                .map(|secs| clamped("AUTOMATION_TIMEOUT_SECS", Duration::from_secs(secs)))
                .unwrap_or(defaults.automation_timeout),
        }
    }

    pub fn readiness(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            interval: self.ready_interval,
            max_attempts: self.ready_attempts,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.automation_poll_interval,
            timeout: self.automation_timeout,
            max_polls: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8766,
            host: "127.0.0.1".to_string(),
            profiles_path: None,
            ready_interval: Duration::from_millis(500),
            ready_attempts: 10,
            typing_tick: Duration::from_millis(100),
            user_data_key: Some("user_data".to_string()),
            automation_base_url: None,
            automation_poll_interval: Duration::from_secs(3),
            automation_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8766);
        assert_eq!(config.readiness(), ReadinessPolicy::default());
        assert_eq!(config.poll_policy(), PollPolicy::default());
        assert_eq!(config.user_data_key.as_deref(), Some("user_data"));
    }

    #[test]
    fn test_clamped_durations() {
        let huge = Duration::from_secs(u64::MAX);
        assert_eq!(clamped("X", huge), MAX_CONFIGURED_DURATION);
        assert_eq!(clamped("X", Duration::from_secs(3)), Duration::from_secs(3));
    }
}
