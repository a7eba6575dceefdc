pub mod config_provider;
pub mod file_system;
pub mod http_client;

pub use config_provider::ConfigSource;
pub use file_system::{FileSystemError, FileSystemResult, TemplateSource};
pub use http_client::{
    HttpClient, HttpClientError, HttpClientResult, OutboundRequest, UpstreamResponse,
};
