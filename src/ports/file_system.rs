use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Error type for file system operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FileSystemError {
    /// Error when encountering an IO issue
    #[error("IO error reading '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error when path is invalid
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for file system operations
pub type FileSystemResult<T> = Result<T, FileSystemError>;

/// TemplateSource defines the port (interface) for loading `data-file` templates
#[async_trait]
pub trait TemplateSource: Send + Sync + 'static {
    /// Read the full contents of a template file
    ///
    /// # Arguments
    /// * `path` - The template path exactly as written in the rule
    ///
    /// # Returns
    /// A future that resolves to the file bytes or an error
    async fn read_template(&self, path: &str) -> FileSystemResult<Bytes>;
}
