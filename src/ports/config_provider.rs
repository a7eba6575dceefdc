use async_trait::async_trait;

use crate::ports::file_system::FileSystemResult;

/// Trait for sources that hand the loader the raw bytes of a configuration document.
///
/// The source is chosen once, when the loader is built; tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Read the configuration document at `location`.
    async fn read_config(&self, location: &str) -> FileSystemResult<Vec<u8>>;
}
