use std::env;

use focusboard_core::config::{BackendKind, ConfigFile};

pub const ENV_REST_URL: &str = "FOCUSBOARD_REST_URL";
pub const ENV_REALTIME_URL: &str = "FOCUSBOARD_REALTIME_URL";
pub const ENV_API_KEY: &str = "FOCUSBOARD_API_KEY";

pub fn rest_base_url(config: &ConfigFile) -> String {
    env_string(ENV_REST_URL)
        .unwrap_or_else(|| config.effective_rest().effective_base_url().to_owned())
}

pub fn rest_endpoint(config: &ConfigFile) -> String {
    config.effective_rest().effective_endpoint().to_owned()
}

pub fn realtime_database_url(config: &ConfigFile) -> Option<String> {
    env_string(ENV_REALTIME_URL).or_else(|| {
        config
            .realtime
            .as_ref()
            .map(|r| r.database_url.trim().to_owned())
            .filter(|s| !s.is_empty())
    })
}

pub fn realtime_path(config: &ConfigFile) -> String {
    config.effective_realtime().effective_path().to_owned()
}

/// Credential for `backend`: the stored override wins, then the config
/// file, then the environment.
pub fn api_key(config: &ConfigFile, backend: BackendKind, stored: Option<String>) -> Option<String> {
    non_empty(stored)
        .or_else(|| configured_api_key(config, backend))
        .or_else(|| env_string(ENV_API_KEY))
}

/// Where the credential in effect comes from, for `credential show`.
pub fn api_key_source(
    config: &ConfigFile,
    backend: BackendKind,
    stored: Option<&str>,
) -> Option<&'static str> {
    if stored.is_some_and(|s| !s.trim().is_empty()) {
        Some("stored")
    } else if configured_api_key(config, backend).is_some() {
        Some("config")
    } else if env_string(ENV_API_KEY).is_some() {
        Some("env")
    } else {
        None
    }
}

fn configured_api_key(config: &ConfigFile, backend: BackendKind) -> Option<String> {
    let key = match backend {
        BackendKind::Rest => config.rest.as_ref().and_then(|r| r.api_key.clone()),
        BackendKind::Realtime => config.realtime.as_ref().and_then(|r| r.api_key.clone()),
    };
    non_empty(key)
}

pub fn rewards(config: &ConfigFile) -> (String, String) {
    let r = config.rewards.clone().unwrap_or_default();
    (r.url, r.api_key)
}

fn env_string(key: &str) -> Option<String> {
    non_empty(env::var(key).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}
