//! Service bus - a configuration-driven HTTP adapter between services.
//!
//! Each configured *adapter* listens on its own port and maps incoming paths
//! to ordered *rule chains*. The last rule of a chain either renders a local
//! response or renders a payload that is forwarded to an upstream service,
//! whose response is relayed back to the caller.
//!
//! Templates use a small directive language (`%QUERY[name]%`, `%FORM[name]%`,
//! `%REGEX[pattern][group]%`, `%BODY%`) documented in [`core::template`].
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use service_bus::{
//!     FileSystemAdapter, HttpClientAdapter, HttpHandler, RuleExecutor, TemplateCache,
//!     config::{Settings, load_config},
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let settings = Settings::default();
//! let config = load_config("config/config.json").await?;
//! let templates = Arc::new(TemplateCache::new(Arc::new(FileSystemAdapter::new())));
//! let executor = Arc::new(RuleExecutor::new(templates));
//! let client = Arc::new(HttpClientAdapter::new(settings.proxy_timeout)?);
//!
//! let handler = HttpHandler::new(&config.adapters[0], executor, client, &settings)?;
//! let app = Arc::new(handler).router();
//! # let _ = app;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping the rule engine inside `core`.
//!
//! # Error Handling
//! Domain errors are `thiserror` enums; application plumbing returns
//! `eyre::Result<T>` with context attached through `WrapErr`.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{AdapterServer, FileSystemAdapter, HttpClientAdapter, HttpHandler},
    core::{RuleExecutor, TemplateCache},
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
