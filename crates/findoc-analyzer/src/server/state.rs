//! Application state for the analyzer server

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::processing::AnalysisQueue;
use crate::storage::JobStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AnalyzerConfig,
    /// Durable job records
    store: Arc<dyn JobStore>,
    /// Queue feeding the worker pool
    queue: Arc<AnalysisQueue>,
}

impl AppState {
    /// Create state, making sure the upload directory exists
    pub fn new(
        config: AnalyzerConfig,
        store: Arc<dyn JobStore>,
        queue: Arc<AnalysisQueue>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.upload_dir)?;
        tracing::info!("Uploads stored in {}", config.storage.upload_dir.display());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                queue,
            }),
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    pub fn queue(&self) -> &Arc<AnalysisQueue> {
        &self.inner.queue
    }

    pub fn upload_dir(&self) -> &Path {
        &self.inner.config.storage.upload_dir
    }

    /// Where the upload for a job is saved
    pub fn upload_path(&self, job_id: &str, file_name: &str) -> PathBuf {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "pdf".to_string());

        self.upload_dir()
            .join(format!("financial_document_{}.{}", job_id, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteJobStore;

    #[test]
    fn test_upload_path_keeps_safe_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AnalyzerConfig::default();
        config.storage.upload_dir = dir.path().join("uploads");

        let (queue, _rx) = AnalysisQueue::new(1, 1);
        let state = AppState::new(
            config,
            Arc::new(SqliteJobStore::in_memory().unwrap()),
            Arc::new(queue),
        )
        .unwrap();

        assert!(state.upload_dir().exists());
        assert!(state
            .upload_path("J1", "q3.PDF")
            .ends_with("financial_document_J1.pdf"));
        assert!(state
            .upload_path("J1", "notes.txt")
            .ends_with("financial_document_J1.txt"));
        assert!(state
            .upload_path("J1", "../../etc/passwd")
            .ends_with("financial_document_J1.pdf"));
        assert!(state
            .upload_path("J1", "weird.p/df")
            .ends_with("financial_document_J1.pdf"));
    }
}
