//! Process-wide cache of `data-file` template contents.
//!
//! Each path gets its own `OnceCell`, stored in an `scc::HashMap`, so that
//! concurrent first requests for the same file perform a single read while
//! other paths load in parallel. A read error leaves the cell empty, so the
//! next use of the path reads the file again. Successfully loaded
//! entries are kept for the lifetime of the process; later changes on disk
//! are not observed.
use std::sync::Arc;

use bytes::Bytes;
use scc::HashMap;
use tokio::sync::OnceCell;

use crate::ports::file_system::{FileSystemResult, TemplateSource};

pub struct TemplateCache {
    source: Arc<dyn TemplateSource>,
    entries: HashMap<String, Arc<OnceCell<Bytes>>>,
}

impl TemplateCache {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// Return the contents of `path`, reading it through the template source
    /// on first use.
    pub async fn load(&self, path: &str) -> FileSystemResult<Bytes> {
        let cell = self.cell(path).await;
        cell.get_or_try_init(|| self.source.read_template(path))
            .await
            .cloned()
    }

    /// Whether `path` has been loaded successfully.
    pub async fn is_cached(&self, path: &str) -> bool {
        self.entries
            .get_async(path)
            .await
            .is_some_and(|entry| entry.get().initialized())
    }

    async fn cell(&self, path: &str) -> Arc<OnceCell<Bytes>> {
        if let Some(entry) = self.entries.get_async(path).await {
            return entry.get().clone();
        }

        let cell = Arc::new(OnceCell::new());
        match self.entries.insert_async(path.to_string(), cell.clone()).await {
            Ok(()) => cell,
            // Another request registered the path first; share its cell.
            Err((key, _)) => self
                .entries
                .get_async(&key)
                .await
                .map(|entry| entry.get().clone())
                .unwrap_or(cell),
        }
    }
}
