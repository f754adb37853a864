use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::DEFAULT_CATEGORY;

pub const DEFAULT_REST_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REST_ENDPOINT: &str = "/api/todos";
pub const DEFAULT_REALTIME_PATH: &str = "todos";
pub const DEFAULT_CATEGORIES: &[&str] = &["Work", "Study", "Health", "Personal", DEFAULT_CATEGORY];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default, rename = "log_level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<RealtimeConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<RewardsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardConfig>,

    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackendKind {
    #[serde(rename = "rest")]
    #[default]
    Rest,
    #[serde(rename = "realtime")]
    Realtime,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Rest => "rest",
            BackendKind::Realtime => "realtime",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RestConfig {
    #[serde(rename = "base-url", alias = "base_url", default)]
    pub base_url: String,

    #[serde(default)]
    pub endpoint: String,

    #[serde(rename = "api-key", alias = "api_key", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl RestConfig {
    pub fn effective_base_url(&self) -> &str {
        non_empty_or(&self.base_url, DEFAULT_REST_BASE_URL)
    }

    pub fn effective_endpoint(&self) -> &str {
        non_empty_or(&self.endpoint, DEFAULT_REST_ENDPOINT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RealtimeConfig {
    #[serde(rename = "database-url", alias = "database_url", default)]
    pub database_url: String,

    #[serde(default)]
    pub path: String,

    #[serde(rename = "api-key", alias = "api_key", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl RealtimeConfig {
    pub fn effective_path(&self) -> &str {
        let trimmed = self.path.trim().trim_matches('/');
        if trimmed.is_empty() {
            DEFAULT_REALTIME_PATH
        } else {
            trimmed
        }
    }
}

/// Optional "now playing" feed shown as the reward panel.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RewardsConfig {
    #[serde(default)]
    pub url: String,

    #[serde(rename = "api-key", alias = "api_key", default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BoardConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("realtime backend requires `realtime.database-url`")]
    RealtimeUrlMissing,
    #[error("rest endpoint must start with '/': {endpoint}")]
    InvalidEndpoint { endpoint: String },
    #[error("category label is empty")]
    EmptyCategory,
    #[error("duplicate category: {name}")]
    DuplicateCategory { name: String },
    #[error("unknown config key: {key}")]
    UnknownKey { key: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl ConfigFile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Realtime {
            let has_url = self
                .realtime
                .as_ref()
                .is_some_and(|r| !r.database_url.trim().is_empty());
            if !has_url {
                return Err(ConfigError::RealtimeUrlMissing);
            }
        }

        if let Some(rest) = &self.rest {
            let endpoint = rest.endpoint.trim();
            if !endpoint.is_empty() && !endpoint.starts_with('/') {
                return Err(ConfigError::InvalidEndpoint {
                    endpoint: endpoint.to_owned(),
                });
            }
        }

        if let Some(board) = &self.board {
            let mut seen = BTreeSet::new();
            for c in &board.categories {
                let c = c.trim();
                if c.is_empty() {
                    return Err(ConfigError::EmptyCategory);
                }
                if !seen.insert(c) {
                    return Err(ConfigError::DuplicateCategory { name: c.to_owned() });
                }
            }
        }

        Ok(())
    }

    pub fn effective_rest(&self) -> RestConfig {
        self.rest.clone().unwrap_or_default()
    }

    pub fn effective_realtime(&self) -> RealtimeConfig {
        self.realtime.clone().unwrap_or_default()
    }

    /// Category choices offered by the add form. The default category is
    /// always available.
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = match &self.board {
            Some(b) if !b.categories.is_empty() => {
                b.categories.iter().map(|c| c.trim().to_owned()).collect()
            }
            _ => DEFAULT_CATEGORIES.iter().map(|c| (*c).to_owned()).collect(),
        };
        if !out.iter().any(|c| c == DEFAULT_CATEGORY) {
            out.push(DEFAULT_CATEGORY.to_owned());
        }
        out
    }

    pub fn set_key(&self, key: &str, value: &str) -> Result<Self, ConfigError> {
        let key = normalize_key(key);
        let mut next = self.clone();
        let text = value.trim().to_owned();
        let optional = (!text.is_empty()).then(|| text.clone());

        match key.as_str() {
            "backend" => next.backend = parse_enum::<BackendKind>(&key, value)?,
            "log-level" => next.log_level = optional,
            "rest.base-url" => next.rest.get_or_insert_with(Default::default).base_url = text,
            "rest.endpoint" => next.rest.get_or_insert_with(Default::default).endpoint = text,
            "rest.api-key" => next.rest.get_or_insert_with(Default::default).api_key = optional,
            "realtime.database-url" => {
                next.realtime
                    .get_or_insert_with(Default::default)
                    .database_url = text
            }
            "realtime.path" => next.realtime.get_or_insert_with(Default::default).path = text,
            "realtime.api-key" => {
                next.realtime.get_or_insert_with(Default::default).api_key = optional
            }
            "rewards.url" => next.rewards.get_or_insert_with(Default::default).url = text,
            "rewards.api-key" => next.rewards.get_or_insert_with(Default::default).api_key = text,
            "board.categories" => {
                next.board.get_or_insert_with(Default::default).categories = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect();
            }
            _ => return Err(ConfigError::UnknownKey { key }),
        }

        next.validate()?;
        Ok(next)
    }

    pub fn get_key(&self, key: &str) -> Result<toml::Value, ConfigError> {
        let key = normalize_key(key);
        let rest = self.effective_rest();
        let realtime = self.effective_realtime();
        let rewards = self.rewards.clone().unwrap_or_default();

        let value = match key.as_str() {
            "backend" => toml::Value::String(self.backend.as_str().to_owned()),
            "log-level" => toml::Value::String(self.log_level.clone().unwrap_or_default()),
            "rest.base-url" => toml::Value::String(rest.effective_base_url().to_owned()),
            "rest.endpoint" => toml::Value::String(rest.effective_endpoint().to_owned()),
            "rest.api-key" => toml::Value::String(mask(rest.api_key.as_deref())),
            "realtime.database-url" => toml::Value::String(realtime.database_url.clone()),
            "realtime.path" => toml::Value::String(realtime.effective_path().to_owned()),
            "realtime.api-key" => toml::Value::String(mask(realtime.api_key.as_deref())),
            "rewards.url" => toml::Value::String(rewards.url),
            "rewards.api-key" => toml::Value::String(mask(Some(rewards.api_key.as_str()))),
            "board.categories" => toml::Value::Array(
                self.categories()
                    .into_iter()
                    .map(toml::Value::String)
                    .collect(),
            ),
            _ => return Err(ConfigError::UnknownKey { key }),
        };
        Ok(value)
    }
}

pub const CONFIG_KEYS: &[&str] = &[
    "backend",
    "log-level",
    "rest.base-url",
    "rest.endpoint",
    "rest.api-key",
    "realtime.database-url",
    "realtime.path",
    "realtime.api-key",
    "rewards.url",
    "rewards.api-key",
    "board.categories",
];

/// Shows only whether a secret is set, never its value.
pub fn mask(secret: Option<&str>) -> String {
    match secret.map(str::trim) {
        Some(s) if !s.is_empty() => "********".to_owned(),
        _ => String::new(),
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().replace('_', "-").to_ascii_lowercase()
}

fn parse_enum<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let value = value.trim();
    let invalid = || ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    };
    let parsed: toml::Value = toml::from_str(&format!("v = \"{value}\"")).map_err(|_| invalid())?;
    let Some(v) = parsed.get("v") else {
        return Err(invalid());
    };
    v.clone().try_into().map_err(|_| invalid())
}
