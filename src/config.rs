use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ConfigError;

/// What to do when, mid-action, the user says something that resolves to an
/// unrelated action which does not ask for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPolicy {
    /// Switch right away, carrying over parameters the new action also declares.
    #[default]
    Immediate,
    /// Stage the switch and wait for a yes/no, as if the action required it.
    Confirm,
    /// Stay on the current action and use the utterance as parameter input only.
    Ignore,
}

impl FromStr for SwitchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(SwitchPolicy::Immediate),
            "confirm" => Ok(SwitchPolicy::Confirm),
            "ignore" => Ok(SwitchPolicy::Ignore),
            other => Err(format!("unknown switch policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum score for the top intent to count as recognized.
    pub intent_threshold: f64,
    pub unconfirmed_switch: SwitchPolicy,
    /// Upper bound on suspended parent actions.
    pub max_context_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            intent_threshold: 0.0,
            unconfirmed_switch: SwitchPolicy::Immediate,
            max_context_depth: 8,
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by `ACTION_INTENT_THRESHOLD`, `ACTION_SWITCH_POLICY`
    /// and `ACTION_MAX_CONTEXT_DEPTH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            intent_threshold: env_parse("ACTION_INTENT_THRESHOLD")?
                .unwrap_or(defaults.intent_threshold),
            unconfirmed_switch: env_parse("ACTION_SWITCH_POLICY")?
                .unwrap_or(defaults.unconfirmed_switch),
            max_context_depth: env_parse("ACTION_MAX_CONTEXT_DEPTH")?
                .unwrap_or(defaults.max_context_depth),
        })
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuisConfig {
    pub endpoint: String,
    pub app_id: String,
    pub subscription_key: String,
    pub timeout_ms: u64,
}

impl Default for LuisConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://westus.api.cognitive.microsoft.com".to_string(),
            app_id: String::new(),
            subscription_key: String::new(),
            timeout_ms: 5_000,
        }
    }
}

impl fmt::Debug for LuisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuisConfig")
            .field("endpoint", &self.endpoint)
            .field("app_id", &self.app_id)
            .field("subscription_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl LuisConfig {
    /// Reads `LUIS_ENDPOINT`, `LUIS_APP_ID`, `LUIS_SUBSCRIPTION_KEY`, `LUIS_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            endpoint: env_var("LUIS_ENDPOINT")?.unwrap_or(defaults.endpoint),
            app_id: env_var("LUIS_APP_ID")?.unwrap_or_default(),
            subscription_key: env_var("LUIS_SUBSCRIPTION_KEY")?.unwrap_or_default(),
            timeout_ms: env_parse("LUIS_TIMEOUT_MS")?.unwrap_or(defaults.timeout_ms),
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.app_id.trim().is_empty() && !self.subscription_key.trim().is_empty()
    }
}

fn env_var(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::Env {
            key: key.to_string(),
            reason: "contains invalid UTF-8".to_string(),
        }),
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(key)? {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Env {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(None),
    }
}
