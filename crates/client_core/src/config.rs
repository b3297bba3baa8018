use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;

use crate::{
    cache::CachePolicy, event_store::RefreshOrdering,
    session_persistence::DEFAULT_SESSION_VALIDITY_DAYS,
};

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub application_name: String,
    pub server_url: String,
    pub session_database_url: String,
    pub session_validity_days: i64,
    pub refresh_ordering: RefreshOrdering,
    pub cache_policy: CachePolicy,
    pub cache_ttl_seconds: Option<u64>,
    /// `None` disables the connectivity probe.
    pub connectivity_probe_interval_ms: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_name: "Cooking club".into(),
            server_url: "http://127.0.0.1:8080".into(),
            session_database_url: "sqlite://./data/client.db".into(),
            session_validity_days: DEFAULT_SESSION_VALIDITY_DAYS,
            refresh_ordering: RefreshOrdering::default(),
            cache_policy: CachePolicy::default(),
            cache_ttl_seconds: None,
            connectivity_probe_interval_ms: Some(5_000),
        }
    }
}

impl ClientSettings {
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_seconds.map(Duration::from_secs)
    }

    pub fn connectivity_probe_interval(&self) -> Option<Duration> {
        self.connectivity_probe_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn session_validity(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_validity_days)
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "application_name" => self.application_name = value.to_string(),
            "server_url" => self.server_url = value.to_string(),
            "session_database_url" => self.session_database_url = value.to_string(),
            "session_validity_days" => match value.parse::<i64>() {
                Ok(days) if days > 0 => self.session_validity_days = days,
                _ => warn!(key, value, "ignoring invalid session validity"),
            },
            "refresh_ordering" => match value.parse() {
                Ok(ordering) => self.refresh_ordering = ordering,
                Err(err) => warn!(key, error = %err, "ignoring setting"),
            },
            "cache_policy" => match value.parse() {
                Ok(policy) => self.cache_policy = policy,
                Err(err) => warn!(key, error = %err, "ignoring setting"),
            },
            "cache_ttl_seconds" => match value.parse::<u64>() {
                Ok(0) => self.cache_ttl_seconds = None,
                Ok(secs) => self.cache_ttl_seconds = Some(secs),
                Err(_) => warn!(key, value, "ignoring invalid cache ttl"),
            },
            "connectivity_probe_interval_ms" => match value.parse::<u64>() {
                Ok(0) => self.connectivity_probe_interval_ms = None,
                Ok(ms) => self.connectivity_probe_interval_ms = Some(ms),
                Err(_) => warn!(key, value, "ignoring invalid probe interval"),
            },
            _ => {}
        }
    }
}

const SETTING_KEYS: &[&str] = &[
    "application_name",
    "server_url",
    "session_database_url",
    "session_validity_days",
    "refresh_ordering",
    "cache_policy",
    "cache_ttl_seconds",
    "connectivity_probe_interval_ms",
];

/// Defaults, then `client.toml` in the working directory, then `APP__*`
/// environment variables.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |name| std::env::var(name).ok())
}

pub fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                for key in SETTING_KEYS {
                    if let Some(value) = file_cfg.get(*key) {
                        let value = match value {
                            toml::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        settings.apply(key, &value);
                    }
                }
            }
            Err(err) => warn!(
                path = %config_path.display(),
                error = %err,
                "ignoring unreadable config file"
            ),
        }
    }

    for key in SETTING_KEYS {
        if let Some(value) = env(&format!("APP__{}", key.to_ascii_uppercase())) {
            settings.apply(key, &value);
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
