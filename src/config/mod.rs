pub mod loader;
pub mod models;
pub mod settings;
pub mod validation;

pub use loader::{ConfigLoader, load_config, parse_config};
pub use models::*;
pub use settings::{LogFormat, Settings, SettingsOverrides};
pub use validation::{ConfigValidator, ValidationError, ValidationResult};
