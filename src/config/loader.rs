use std::sync::Arc;

use eyre::{Context, Result};
use serde_json::{Map, Value};

use crate::{
    adapters::FileSystemAdapter, config::models::Config, ports::config_provider::ConfigSource,
};

/// Reads and parses the JSON rule document through an injected [`ConfigSource`].
pub struct ConfigLoader {
    source: Arc<dyn ConfigSource>,
}

impl ConfigLoader {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self { source }
    }

    /// Read `location` from the source and parse it.
    pub async fn load(&self, location: &str) -> Result<Config> {
        let bytes = self
            .source
            .read_config(location)
            .await
            .with_context(|| format!("Failed to read config from {location}"))?;

        parse_config(&bytes).with_context(|| format!("Failed to parse config from {location}"))
    }
}

/// Load a rule document from the local file system
pub async fn load_config(config_path: &str) -> Result<Config> {
    ConfigLoader::new(Arc::new(FileSystemAdapter::new()))
        .load(config_path)
        .await
}

/// Parse a JSON rule document, matching object keys case-insensitively.
pub fn parse_config(bytes: &[u8]) -> Result<Config> {
    let document: Value =
        serde_json::from_slice(bytes).wrap_err("Config is not a valid JSON document")?;
    serde_json::from_value(lowercase_keys(document))
        .wrap_err("Config does not match the expected structure")
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), lowercase_keys(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}
