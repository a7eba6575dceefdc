#![allow(clippy::collapsible_if)]

use std::collections::HashMap;

use http::{HeaderName, HeaderValue, Method};

use crate::{
    config::models::{AdapterConfig, Config, HEALTH_CHECK_PATH, Rule, split_header_line},
    core::template,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Port conflict: {message}")]
    PortConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Rule document validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire rule document
    pub fn validate(config: &Config) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.adapters.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "adapters".to_string(),
            });
        }

        for adapter in &config.adapters {
            if let Err(mut adapter_errors) = Self::validate_adapter(adapter) {
                errors.append(&mut adapter_errors);
            }
        }

        if let Err(mut conflicts) = Self::check_port_conflicts(&config.adapters) {
            errors.append(&mut conflicts);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Non-fatal observations about the document, suitable for logging at startup.
    pub fn warnings(config: &Config) -> Vec<String> {
        let mut warnings = Vec::new();
        for adapter in &config.adapters {
            let name = adapter.display_name();
            if adapter.rules.is_empty() {
                warnings.push(format!(
                    "adapter '{name}' has no rules and only serves {HEALTH_CHECK_PATH}"
                ));
            }
            for rule in &adapter.rules {
                let path = &rule.from.path;
                if path == HEALTH_CHECK_PATH {
                    warnings.push(format!(
                        "adapter '{name}': rule for {HEALTH_CHECK_PATH} is shadowed by the built-in health check"
                    ));
                }
                if !rule.to.data.is_empty() && !rule.to.data_file.is_empty() {
                    warnings.push(format!(
                        "adapter '{name}' rule '{path}': both data and data-file are set, data-file is ignored"
                    ));
                }
                if rule.to.data.is_empty()
                    && !rule.to.data_file.is_empty()
                    && !std::path::Path::new(&rule.to.data_file).exists()
                {
                    warnings.push(format!(
                        "adapter '{name}' rule '{path}': data-file '{}' does not exist yet",
                        rule.to.data_file
                    ));
                }
            }
        }
        warnings
    }

    fn validate_adapter(adapter: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let name = adapter.display_name();

        if adapter.port == 0 {
            errors.push(ValidationError::InvalidField {
                field: format!("adapter '{name}' port"),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        for (index, rule) in adapter.rules.iter().enumerate() {
            let context = format!("adapter '{name}' rule #{}", index + 1);
            if let Err(mut rule_errors) = Self::validate_rule(&context, rule) {
                errors.append(&mut rule_errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a single rule
    fn validate_rule(context: &str, rule: &Rule) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !rule.from.path.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: format!("{context} from.path"),
                message: format!("Path '{}' must start with '/'", rule.from.path),
            });
        }

        if !rule.to.url.is_empty() {
            if let Err(e) = Self::validate_url(&rule.to.url, &format!("{context} to.url")) {
                errors.push(e);
            }
        }

        if !rule.to.http_method.is_empty() {
            if Method::from_bytes(rule.to.http_method.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidField {
                    field: format!("{context} to.http-method"),
                    message: format!("'{}' is not a valid HTTP method", rule.to.http_method),
                });
            }
        }

        for line in &rule.to.headers {
            if let Err(e) = Self::validate_header_line(line, &format!("{context} to.headers")) {
                errors.push(e);
            }
        }

        for e in template::check_patterns(rule.to.data.as_bytes()) {
            errors.push(ValidationError::InvalidField {
                field: format!("{context} to.data"),
                message: e.to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    /// Validate a `Name: Value` header line
    fn validate_header_line(line: &str, context: &str) -> ValidationResult<()> {
        let Some((name, value)) = split_header_line(line) else {
            return Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Header '{line}' must have the form 'Name: Value'"),
            });
        };

        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("'{name}' is not a valid header name"),
            });
        }

        if HeaderValue::from_str(value).is_err() {
            return Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Header '{name}' has an invalid value"),
            });
        }

        Ok(())
    }

    /// Every adapter binds its own port, so two adapters cannot share one.
    fn check_port_conflicts(adapters: &[AdapterConfig]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen: HashMap<u16, String> = HashMap::new();

        for adapter in adapters.iter().filter(|a| a.port != 0) {
            let name = adapter.display_name();
            if let Some(first) = seen.get(&adapter.port) {
                errors.push(ValidationError::PortConflict {
                    message: format!(
                        "adapters '{first}' and '{name}' both use port {}",
                        adapter.port
                    ),
                });
            } else {
                seen.insert(adapter.port, name);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
