//! Configuration Management
//!
//! Resolves the provider block (address and credentials) against the
//! `LEGOCHARM_*` environment variables.

use crate::framework::Diagnostics;
use crate::legocharm::{ClientError, DEFAULT_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ADDRESS: &str = "LEGOCHARM_ADDRESS";
pub const ENV_USERNAME: &str = "LEGOCHARM_USERNAME";
pub const ENV_PASSWORD: &str = "LEGOCHARM_PASSWORD";
pub const ENV_TIMEOUT: &str = "LEGOCHARM_API_TIMEOUT";

/// Marker the host uses for values that are not known until apply
pub const UNKNOWN_MARKER: &str = "<unknown>";

/// A single configuration attribute as the host hands it over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigValue {
    #[default]
    Null,
    Unknown,
    Known(String),
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => ConfigValue::Null,
            Some(v) if v == UNKNOWN_MARKER => ConfigValue::Unknown,
            Some(v) => ConfigValue::Known(v),
        })
    }
}

/// Provider block configuration
#[derive(Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub address: ConfigValue,
    #[serde(default)]
    pub username: ConfigValue,
    #[serde(default)]
    pub password: ConfigValue,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = match self.password {
            ConfigValue::Known(_) => "***",
            ConfigValue::Unknown => "<unknown>",
            ConfigValue::Null => "null",
        };
        f.debug_struct("ProviderConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &password)
            .finish()
    }
}

/// Fully resolved settings, ready to build a client from
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub address: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct Setting {
    key: &'static str,
    label: &'static str,
    env: &'static str,
}

const ADDRESS: Setting = Setting {
    key: "address",
    label: "Address",
    env: ENV_ADDRESS,
};
const USERNAME: Setting = Setting {
    key: "username",
    label: "Username",
    env: ENV_USERNAME,
};
const PASSWORD: Setting = Setting {
    key: "password",
    label: "Password",
    env: ENV_PASSWORD,
};

impl ProviderConfig {
    /// Parse the provider block from the host's JSON configuration
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).context("Invalid provider configuration")
    }

    /// Default location of the provider configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("legocharm").join("provider.yaml"))
    }

    /// Load the provider block from a YAML (or JSON) file.
    ///
    /// An explicit path must exist; without one the default path is used
    /// when present, and an empty block otherwise.
    pub fn load_block(path: Option<&Path>) -> Result<serde_json::Value> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(serde_json::Value::Null),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Resolve against the environment.
    ///
    /// Environment variables supply defaults that explicit configuration
    /// overrides. Returns `None` when any error diagnostic was raised.
    pub fn resolve<F>(&self, lookup: F) -> (Option<ProviderSettings>, Diagnostics)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut diags = Diagnostics::new();

        let settings = [
            (&ADDRESS, &self.address),
            (&USERNAME, &self.username),
            (&PASSWORD, &self.password),
        ];

        for (setting, value) in settings {
            if *value == ConfigValue::Unknown {
                diags.add_attribute_error(
                    setting.key,
                    format!("Unknown LegoCharm API {}", setting.label),
                    format!(
                        "The provider cannot create the LegoCharm API client as there is an unknown configuration value for the LegoCharm API {}. \
                         Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                        setting.key, setting.env
                    ),
                );
            }
        }
        if diags.has_error() {
            return (None, diags);
        }

        let mut resolved = Vec::with_capacity(settings.len());
        for (setting, value) in settings {
            let mut effective = lookup(setting.env).unwrap_or_default();
            if let ConfigValue::Known(v) = value {
                effective = v.clone();
            }

            if effective.is_empty() {
                diags.add_attribute_error(
                    setting.key,
                    format!("LegoCharm API {} Not Set", setting.label),
                    format!(
                        "The provider cannot create the LegoCharm API client as there is no configured {}. \
                         Set the {} value in the provider configuration or use the {} environment variable.",
                        setting.key, setting.key, setting.env
                    ),
                );
            }
            resolved.push(effective);
        }

        let timeout = match lookup(ENV_TIMEOUT) {
            Some(raw) if !raw.is_empty() => match parse_timeout(&raw) {
                Ok(timeout) => timeout,
                Err(e) => {
                    diags.add_error("Invalid LegoCharm API Timeout", e.to_string());
                    DEFAULT_TIMEOUT
                }
            },
            _ => DEFAULT_TIMEOUT,
        };

        if diags.has_error() {
            return (None, diags);
        }

        let mut resolved = resolved.into_iter();
        let settings = ProviderSettings {
            address: resolved.next().unwrap_or_default(),
            username: resolved.next().unwrap_or_default(),
            password: resolved.next().unwrap_or_default(),
            timeout,
        };
        (Some(settings), diags)
    }
}

/// Parse a request timeout given either as a duration ("30s", "2m") or a
/// whole number of seconds
pub fn parse_timeout(raw: &str) -> std::result::Result<Duration, ClientError> {
    let raw = raw.trim();
    if let Ok(duration) = humantime::parse_duration(raw) {
        return Ok(duration);
    }
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ClientError::InvalidTimeout(raw.to_string()))
}

/// Environment lookup backed by the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
