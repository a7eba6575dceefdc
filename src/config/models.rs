//! Configuration data structures for the service bus.
//!
//! These types map directly to the JSON rule document. Every field defaults to
//! its empty value so that partial documents load the same way they always
//! have; [`crate::config::validation`] decides what is actually usable.
//! Keys are matched case-insensitively by the loader, which lower-cases them
//! before deserialization.
use serde::{Deserialize, Serialize};

/// Path served by every adapter regardless of its rules.
pub const HEALTH_CHECK_PATH: &str = "/health-check";

/// The whole rule document: a list of independently served adapters.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub adapters: Vec<AdapterConfig>,
}

/// One listening service with its own port and rules.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AdapterConfig {
    pub name: String,
    pub port: u16,
    pub rules: Vec<Rule>,
}

impl AdapterConfig {
    /// Name used in logs; falls back to the port for unnamed adapters.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("adapter:{}", self.port)
        } else {
            self.name.clone()
        }
    }
}

/// A `from -> to` binding.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Rule {
    pub from: RuleFrom,
    pub to: RuleTo,
}

impl Rule {
    pub fn new(from: RuleFrom, to: RuleTo) -> Self {
        Self { from, to }
    }
}

/// Incoming side of a rule. The method is informational; routing uses the path only.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RuleFrom {
    pub path: String,
    #[serde(rename = "http-method")]
    pub http_method: String,
}

impl RuleFrom {
    pub fn new(path: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            http_method: http_method.into(),
        }
    }
}

/// Outgoing side of a rule: a local response, or a request forwarded to `url`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RuleTo {
    /// Empty for local responses.
    pub url: String,
    #[serde(rename = "http-method")]
    pub http_method: String,
    /// `Name: Value` lines.
    pub headers: Vec<String>,
    /// Inline template; takes precedence over `data_file`.
    pub data: String,
    #[serde(rename = "data-file")]
    pub data_file: String,
}

impl RuleTo {
    /// A local response rendered from an inline template.
    pub fn local(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// A request forwarded to `url` with the given method.
    pub fn forward(url: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_method: http_method.into(),
            ..Self::default()
        }
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_data_file(mut self, data_file: impl Into<String>) -> Self {
        self.data_file = data_file.into();
        self
    }

    pub fn is_local(&self) -> bool {
        self.url.is_empty()
    }
}

/// Split a `Name: Value` header line at its first colon, trimming both sides.
pub fn split_header_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
}
