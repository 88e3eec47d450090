use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const CONFIG_ENV: &str = "PARLOR_CONFIG";
pub const BASE_URL_ENV: &str = "PARLOR_BASE_URL";
pub const TIMEOUT_ENV: &str = "PARLOR_TIMEOUT_MS";
pub const FRAME_ENV: &str = "PARLOR_FRAME_MS";
pub const HOLD_ENV: &str = "PARLOR_HOLD_MS";
pub const HISTORY_LIMIT_ENV: &str = "PARLOR_HISTORY_LIMIT";

/// Client settings for talking to the authority and pacing the display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Authority root, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Replay tick period
    pub frame_interval_ms: u64,
    /// How long a settled round stays on screen before resetting
    pub settle_hold_ms: u64,
    pub limbo_hold_ms: u64,
    pub history_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            request_timeout_ms: 10_000,
            frame_interval_ms: 16,
            settle_hold_ms: 2_000,
            limbo_hold_ms: 3_000,
            history_limit: 50,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn settle_hold(&self) -> Duration {
        Duration::from_millis(self.settle_hold_ms)
    }

    pub fn limbo_hold(&self) -> Duration {
        Duration::from_millis(self.limbo_hold_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url cannot be empty".into()));
        }
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url is not a URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_interval_ms must be greater than 0".into(),
            ));
        }
        if self.settle_hold_ms == 0 || self.limbo_hold_ms == 0 {
            return Err(ConfigError::Invalid(
                "hold intervals must be greater than 0".into(),
            ));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigSources {
    pub base_url: ValueSource,
    pub request_timeout_ms: ValueSource,
    pub frame_interval_ms: ValueSource,
    pub settle_hold_ms: ValueSource,
    pub limbo_hold_ms: ValueSource,
    pub history_limit: ValueSource,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            base_url: ValueSource::Default,
            request_timeout_ms: ValueSource::Default,
            frame_interval_ms: ValueSource::Default,
            settle_hold_ms: ValueSource::Default,
            limbo_hold_ms: ValueSource::Default,
            history_limit: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigResolved {
    pub config: ClientConfig,
    pub sources: ConfigSources,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub fn load() -> Result<ClientConfig, ConfigError> {
    load_with_sources().map(|resolved| resolved.config)
}

/// Defaults, then the TOML file named by `PARLOR_CONFIG`, then `PARLOR_*`
/// environment overrides. Empty variables are ignored.
pub fn load_with_sources() -> Result<ConfigResolved, ConfigError> {
    let mut cfg = ClientConfig::default();
    let mut sources = ConfigSources::default();

    if let Some(path) = env_value(CONFIG_ENV) {
        let raw = fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&raw)?;
        if let Some(v) = file.base_url {
            cfg.base_url = v;
            sources.base_url = ValueSource::File;
        }
        if let Some(v) = file.request_timeout_ms {
            cfg.request_timeout_ms = v;
            sources.request_timeout_ms = ValueSource::File;
        }
        if let Some(v) = file.frame_interval_ms {
            cfg.frame_interval_ms = v;
            sources.frame_interval_ms = ValueSource::File;
        }
        if let Some(v) = file.settle_hold_ms {
            cfg.settle_hold_ms = v;
            sources.settle_hold_ms = ValueSource::File;
        }
        if let Some(v) = file.limbo_hold_ms {
            cfg.limbo_hold_ms = v;
            sources.limbo_hold_ms = ValueSource::File;
        }
        if let Some(v) = file.history_limit {
            cfg.history_limit = v;
            sources.history_limit = ValueSource::File;
        }
    }

    if let Some(url) = env_value(BASE_URL_ENV) {
        cfg.base_url = url;
        sources.base_url = ValueSource::Env;
    }
    if let Some(timeout) = env_value(TIMEOUT_ENV) {
        cfg.request_timeout_ms = parse_env(TIMEOUT_ENV, &timeout)?;
        sources.request_timeout_ms = ValueSource::Env;
    }
    if let Some(frame) = env_value(FRAME_ENV) {
        cfg.frame_interval_ms = parse_env(FRAME_ENV, &frame)?;
        sources.frame_interval_ms = ValueSource::Env;
    }
    if let Some(hold) = env_value(HOLD_ENV) {
        cfg.settle_hold_ms = parse_env(HOLD_ENV, &hold)?;
        sources.settle_hold_ms = ValueSource::Env;
    }
    if let Some(limit) = env_value(HISTORY_LIMIT_ENV) {
        cfg.history_limit = parse_env(HISTORY_LIMIT_ENV, &limit)?;
        sources.history_limit = ValueSource::Env;
    }

    cfg.validate()?;
    Ok(ConfigResolved {
        config: cfg,
        sources,
    })
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
    #[serde(default)]
    frame_interval_ms: Option<u64>,
    #[serde(default)]
    settle_hold_ms: Option<u64>,
    #[serde(default)]
    limbo_hold_ms: Option<u64>,
    #[serde(default)]
    history_limit: Option<usize>,
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{name} is not a valid number: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let cfg = ClientConfig {
            base_url: "ftp://example.com".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let cfg = ClientConfig {
            base_url: "  ".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_intervals() {
        let cfg = ClientConfig {
            frame_interval_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ClientConfig {
            settle_hold_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file: FileConfig = toml::from_str("frame_interval_ms = 33").expect("parse");
        assert_eq!(file.frame_interval_ms, Some(33));
        assert!(file.base_url.is_none());
    }
}
