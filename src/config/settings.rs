//! Runtime settings that sit outside the rule document.
//!
//! Values are layered with the `config` crate: built-in defaults, then
//! `SERVICE_BUS_*` environment variables, then command-line overrides.
use std::time::Duration;

use config::{Config as Layered, Environment};
use eyre::{Result, WrapErr, eyre};
use http::StatusCode;
use serde::{Deserialize, Deserializer};

pub const ENV_PREFIX: &str = "SERVICE_BUS";
pub const DEFAULT_LOG_FILE: &str = "service-bus.log";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Interface every adapter binds to.
    pub bind_host: String,
    /// Upper bound for one proxied upstream exchange.
    #[serde(deserialize_with = "deserialize_duration")]
    pub proxy_timeout: Duration,
    /// Largest inbound request body that is buffered.
    pub max_body_bytes: usize,
    /// Status sent with `{"error": ...}` bodies when the upstream call fails.
    pub upstream_error_status: u16,
    /// Send the upstream status to the client instead of `200 OK`.
    pub relay_upstream_status: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    /// File that receives a copy of every log line; empty disables it.
    pub log_file: String,
}

/// Values supplied on the command line; `None` keeps the lower layers.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub bind_host: Option<String>,
    pub proxy_timeout: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<String>,
}

impl Settings {
    /// Build settings from defaults, the environment and `overrides`.
    pub fn load(overrides: &SettingsOverrides) -> Result<Self> {
        Self::load_with_environment(overrides, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_environment(
        overrides: &SettingsOverrides,
        environment: Environment,
    ) -> Result<Self> {
        let layered = Layered::builder()
            .set_default("bind_host", "0.0.0.0")?
            .set_default("proxy_timeout", "30s")?
            .set_default("max_body_bytes", 10_i64 * 1024 * 1024)?
            .set_default("upstream_error_status", 200_i64)?
            .set_default("relay_upstream_status", false)?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?
            .set_default("log_file", DEFAULT_LOG_FILE)?
            .add_source(environment.try_parsing(true))
            .set_override_option("bind_host", overrides.bind_host.clone())?
            .set_override_option("proxy_timeout", overrides.proxy_timeout.clone())?
            .set_override_option("log_level", overrides.log_level.clone())?
            .set_override_option("log_format", overrides.log_format.clone())?
            .set_override_option("log_file", overrides.log_file.clone())?
            .build()
            .wrap_err("Failed to assemble runtime settings")?;

        let settings: Settings = layered
            .try_deserialize()
            .wrap_err("Invalid runtime settings")?;
        settings.upstream_error_status()?;
        Ok(settings)
    }

    pub fn log_file(&self) -> Option<&str> {
        (!self.log_file.is_empty()).then_some(self.log_file.as_str())
    }

    /// The configured error status as a `StatusCode`.
    pub fn upstream_error_status(&self) -> Result<StatusCode> {
        StatusCode::from_u16(self.upstream_error_status).map_err(|_| {
            eyre!(
                "upstream_error_status {} is not a valid HTTP status",
                self.upstream_error_status
            )
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            proxy_timeout: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
            upstream_error_status: 200,
            relay_upstream_status: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::load_with_environment(&SettingsOverrides::default(), env(&[])).unwrap();
        assert_eq!(settings.bind_host, "0.0.0.0");
        assert_eq!(settings.proxy_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.upstream_error_status().unwrap(), StatusCode::OK);
        assert!(!settings.relay_upstream_status);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.log_file(), Some(DEFAULT_LOG_FILE));
    }

    #[test]
    fn test_environment_then_overrides() {
        let overrides = SettingsOverrides {
            proxy_timeout: Some("5s".to_string()),
            log_format: Some("json".to_string()),
            log_file: Some(String::new()),
            ..Default::default()
        };
        let settings = Settings::load_with_environment(
            &overrides,
            env(&[
                ("SERVICE_BUS_PROXY_TIMEOUT", "1m"),
                ("SERVICE_BUS_UPSTREAM_ERROR_STATUS", "502"),
                ("SERVICE_BUS_BIND_HOST", "127.0.0.1"),
                ("SERVICE_BUS_RELAY_UPSTREAM_STATUS", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.proxy_timeout, Duration::from_secs(5));
        assert_eq!(settings.bind_host, "127.0.0.1");
        assert_eq!(
            settings.upstream_error_status().unwrap(),
            StatusCode::BAD_GATEWAY
        );
        assert!(settings.relay_upstream_status);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.log_file(), None);
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let overrides = SettingsOverrides {
            proxy_timeout: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(Settings::load_with_environment(&overrides, env(&[])).is_err());
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let result = Settings::load_with_environment(
            &SettingsOverrides::default(),
            env(&[("SERVICE_BUS_UPSTREAM_ERROR_STATUS", "42")]),
        );
        assert!(result.is_err());
    }
}
