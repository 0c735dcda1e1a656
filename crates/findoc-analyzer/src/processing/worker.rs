//! Background workers that run analysis jobs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::job_queue::AnalysisQueue;
use crate::error::{Error, Result};
use crate::pipeline::{NoopObserver, Pipeline, PipelineObserver, PipelineState};
use crate::storage::JobStore;
use crate::types::{AnalysisMessage, JobStatus};

/// Deletes the source document when dropped, including during unwinding
struct SourceArtifact {
    path: PathBuf,
}

impl SourceArtifact {
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Drop for SourceArtifact {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed source document {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove source document {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Runs one analysis message through the pipeline and records the outcome
pub struct AnalysisWorker {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    progress: Option<Arc<AnalysisQueue>>,
}

impl AnalysisWorker {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            store,
            pipeline,
            progress: None,
        }
    }

    /// Report run progress into a queue's progress map
    pub fn with_progress(mut self, queue: Arc<AnalysisQueue>) -> Self {
        self.progress = Some(queue);
        self
    }

    /// Execute a message: run, then record `completed` or `failed`.
    ///
    /// The source file is removed whatever the outcome. Errors are recorded
    /// on the job and then returned to the caller.
    pub async fn execute(&self, message: &AnalysisMessage) -> Result<String> {
        let _artifact = SourceArtifact::new(&message.file_path);
        let job_id = message.job_id.as_str();

        match self.store.get(job_id) {
            Ok(Some(job)) if job.status.is_terminal() => {
                tracing::warn!("Job {} is already {}, not re-running", job_id, job.status);
                let err = Error::InvalidTransition {
                    job_id: job_id.to_string(),
                    from: job.status.to_string(),
                    to: JobStatus::Processing.to_string(),
                };
                self.finish_progress(job_id, PipelineState::Failed, Some(err.to_string()));
                return Err(err);
            }
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!("Job {} has no record; assuming processing", job_id),
            Err(e) => tracing::warn!("Could not load job {}: {}; assuming processing", job_id, e),
        }

        tracing::info!(
            "Job {} started: file='{}' query='{}'",
            job_id,
            message.file_name,
            message.query
        );

        match self.run(message).await {
            Ok(result) => {
                match self.store.complete(job_id, &result) {
                    Ok(()) => {}
                    Err(Error::JobNotFound(_)) => {
                        tracing::warn!("Job {} finished but has no record to update", job_id)
                    }
                    Err(e) => {
                        tracing::error!("Failed to record result of job {}: {}", job_id, e);
                        self.record_failure(job_id, &e.to_string());
                        return Err(e);
                    }
                }
                self.finish_progress(job_id, PipelineState::Done, None);
                tracing::info!("Job {} completed", job_id);
                Ok(result)
            }
            Err(e) => {
                self.record_failure(job_id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn run(&self, message: &AnalysisMessage) -> Result<String> {
        if !Path::new(&message.file_path).exists() {
            return Err(Error::InputNotFound(message.file_path.clone()));
        }

        let observer: Box<dyn PipelineObserver> = match &self.progress {
            Some(queue) => Box::new(queue.observer(&message.job_id)),
            None => Box::new(NoopObserver),
        };

        self.pipeline
            .run(&message.query, &message.file_path, observer.as_ref())
            .await
    }

    fn record_failure(&self, job_id: &str, description: &str) {
        tracing::error!("Job {} failed: {}", job_id, description);
        if let Err(e) = self.store.fail(job_id, description) {
            tracing::error!("Failed to record failure of job {}: {}", job_id, e);
        }
        self.finish_progress(job_id, PipelineState::Failed, Some(description.to_string()));
    }

    fn finish_progress(&self, job_id: &str, state: PipelineState, error: Option<String>) {
        if let Some(queue) = &self.progress {
            queue.finish(job_id, state, error);
        }
    }

    /// Execute on a separate task so a panic becomes a failed job
    pub async fn handle(self: &Arc<Self>, message: AnalysisMessage) -> Result<String> {
        let worker = Arc::clone(self);
        let job_id = message.job_id.clone();

        match tokio::spawn(async move { worker.execute(&message).await }).await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                let description = format!("Worker task aborted: {}", join_error);
                self.record_failure(&job_id, &description);
                Err(Error::internal(description))
            }
        }
    }
}

/// Start `count` workers sharing one receiver
pub fn spawn_workers(
    worker: Arc<AnalysisWorker>,
    receiver: mpsc::Receiver<AnalysisMessage>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));

    (0..count.max(1))
        .map(|index| {
            let worker = Arc::clone(&worker);
            let receiver = Arc::clone(&receiver);

            tokio::spawn(async move {
                tracing::info!("Analysis worker {} started", index);
                loop {
                    // Lock only while waiting for the next message
                    let message = { receiver.lock().await.recv().await };
                    let Some(message) = message else {
                        break;
                    };

                    let job_id = message.job_id.clone();
                    if let Err(e) = worker.handle(message).await {
                        tracing::error!("Worker {} job {} ended with error: {}", index, job_id, e);
                    }
                }
                tracing::info!("Analysis worker {} stopped", index);
            })
        })
        .collect()
}
