use async_trait::async_trait;
use bytes::Bytes;

use crate::ports::{
    config_provider::ConfigSource,
    file_system::{FileSystemError, FileSystemResult, TemplateSource},
};

/// Local disk adapter backing both the config document and `data-file` templates.
///
/// Paths are used exactly as written in the configuration, so relative paths
/// resolve against the working directory of the process.
#[derive(Debug, Default, Clone)]
pub struct FileSystemAdapter;

impl FileSystemAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn read(&self, path: &str) -> FileSystemResult<Vec<u8>> {
        if path.is_empty() {
            return Err(FileSystemError::InvalidPath("empty path".to_string()));
        }

        tokio::fs::read(path)
            .await
            .map_err(|source| FileSystemError::IoError {
                path: path.to_string(),
                source,
            })
    }
}

#[async_trait]
impl ConfigSource for FileSystemAdapter {
    async fn read_config(&self, location: &str) -> FileSystemResult<Vec<u8>> {
        tracing::debug!(path = location, "Reading configuration document");
        self.read(location).await
    }
}

#[async_trait]
impl TemplateSource for FileSystemAdapter {
    async fn read_template(&self, path: &str) -> FileSystemResult<Bytes> {
        tracing::debug!(path, "Reading template file");
        self.read(path).await.map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn create_test_file(dir: &TempDir, path: &str, content: &[u8]) -> String {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(&full_path, content).await.unwrap();
        full_path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_read_template() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(&temp_dir, "templates/reply.xml", b"<a>%BODY%</a>").await;

        let fs = FileSystemAdapter::new();
        let bytes = fs.read_template(&path).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"<a>%BODY%</a>"));
    }

    #[tokio::test]
    async fn test_read_config_keeps_raw_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let content = b"{\"adapters\":[]}\xff";
        let path = create_test_file(&temp_dir, "config.json", content).await;

        let fs = FileSystemAdapter::new();
        assert_eq!(fs.read_config(&path).await.unwrap(), content.to_vec());
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.txt");
        let missing = missing.to_str().unwrap();

        let err = FileSystemAdapter::new()
            .read_template(missing)
            .await
            .unwrap_err();
        match err {
            FileSystemError::IoError { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_path_is_invalid() {
        let err = FileSystemAdapter::new().read_config("").await.unwrap_err();
        assert!(matches!(err, FileSystemError::InvalidPath(_)));
    }
}
