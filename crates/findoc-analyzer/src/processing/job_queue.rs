//! Analysis queue with in-memory run progress
//!
//! The job store is the durable record; progress kept here is an
//! observability view of runs since process start.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::agents::StageId;
use crate::error::{Error, Result};
use crate::pipeline::{PipelineObserver, PipelineState};
use crate::types::AnalysisMessage;

/// Progress information for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunProgress {
    pub job_id: String,
    pub file_name: String,
    pub state: PipelineState,
    pub stages_completed: Vec<StageId>,
    /// Milliseconds spent per completed stage
    pub stage_durations_ms: Vec<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunProgress {
    pub fn new(job_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            file_name: file_name.into(),
            state: PipelineState::Pending,
            stages_completed: Vec::new(),
            stage_durations_ms: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Queue for handing analysis messages to workers
pub struct AnalysisQueue {
    /// Runs with progress
    runs: Arc<DashMap<String, RunProgress>>,
    /// Channel for sending messages to workers
    sender: mpsc::Sender<AnalysisMessage>,
    /// Number of workers
    worker_count: usize,
    /// Messages submitted but not yet finished
    in_flight: Arc<AtomicUsize>,
}

impl AnalysisQueue {
    /// Create a bounded queue; the receiver goes to the worker pool
    pub fn new(worker_count: usize, capacity: usize) -> (Self, mpsc::Receiver<AnalysisMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let queue = Self {
            runs: Arc::new(DashMap::new()),
            sender,
            worker_count,
            in_flight: Arc::new(AtomicUsize::new(0)),
        };

        (queue, receiver)
    }

    /// Enqueue a message for exactly one worker
    pub async fn submit(&self, message: AnalysisMessage) -> Result<()> {
        let job_id = message.job_id.clone();
        self.runs.insert(
            job_id.clone(),
            RunProgress::new(&message.job_id, &message.file_name),
        );
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.sender.send(message).await {
            tracing::error!("Failed to enqueue job {}: {}", job_id, e);
            self.finish(&job_id, PipelineState::Failed, Some(e.to_string()));
            return Err(Error::internal(format!("Analysis queue is closed: {}", e)));
        }

        tracing::info!("Job {} queued", job_id);
        Ok(())
    }

    /// Get progress for a job
    pub fn get_progress(&self, job_id: &str) -> Option<RunProgress> {
        self.runs.get(job_id).map(|p| p.clone())
    }

    /// Get all runs
    pub fn list_runs(&self) -> Vec<RunProgress> {
        self.runs.iter().map(|e| e.value().clone()).collect()
    }

    /// Update the pipeline state of a run
    pub fn update_state(&self, job_id: &str, state: PipelineState) {
        if let Some(mut progress) = self.runs.get_mut(job_id) {
            progress.state = state;
            progress.updated_at = Utc::now();
        }
    }

    /// Record the terminal state of a run
    pub fn finish(&self, job_id: &str, state: PipelineState, error: Option<String>) {
        if let Some(mut progress) = self.runs.get_mut(job_id) {
            progress.state = state;
            progress.error = error;
            progress.updated_at = Utc::now();
        }
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Observer feeding pipeline transitions into this queue's progress map
    pub fn observer(&self, job_id: &str) -> ProgressObserver {
        ProgressObserver {
            runs: Arc::clone(&self.runs),
            job_id: job_id.to_string(),
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let count = |wanted: fn(&PipelineState) -> bool| {
            self.runs.iter().filter(|r| wanted(&r.state)).count()
        };

        QueueStats {
            total_jobs: self.runs.len(),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            pending: count(|s| *s == PipelineState::Pending),
            running: count(|s| !s.is_terminal() && *s != PipelineState::Pending),
            done: count(|s| *s == PipelineState::Done),
            failed: count(|s| *s == PipelineState::Failed),
            worker_count: self.worker_count,
        }
    }
}

/// Writes pipeline transitions for one job into the progress map
pub struct ProgressObserver {
    runs: Arc<DashMap<String, RunProgress>>,
    job_id: String,
}

impl PipelineObserver for ProgressObserver {
    fn on_transition(&self, from: PipelineState, to: PipelineState) {
        tracing::debug!("Job {}: {} -> {}", self.job_id, from.as_str(), to.as_str());
        if let Some(mut progress) = self.runs.get_mut(&self.job_id) {
            progress.state = to;
            progress.updated_at = Utc::now();
        }
    }

    fn on_stage_complete(&self, stage: StageId, elapsed: Duration) {
        if let Some(mut progress) = self.runs.get_mut(&self.job_id) {
            progress.stages_completed.push(stage);
            progress.stage_durations_ms.push(elapsed.as_millis() as u64);
            progress.updated_at = Utc::now();
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub in_flight: usize,
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    pub worker_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> AnalysisMessage {
        AnalysisMessage {
            job_id: id.to_string(),
            query: "q".to_string(),
            file_path: format!("/tmp/{}.pdf", id),
            file_name: format!("{}.pdf", id),
        }
    }

    #[tokio::test]
    async fn test_submit_tracks_progress() {
        let (queue, mut receiver) = AnalysisQueue::new(2, 10);
        queue.submit(message("J1")).await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().job_id, "J1");
        let progress = queue.get_progress("J1").unwrap();
        assert_eq!(progress.state, PipelineState::Pending);
        assert_eq!(queue.stats().in_flight, 1);

        let observer = queue.observer("J1");
        observer.on_transition(PipelineState::Pending, PipelineState::Verifying);
        observer.on_stage_complete(StageId::Verification, Duration::from_millis(5));
        assert_eq!(queue.stats().running, 1);

        queue.finish("J1", PipelineState::Done, None);
        let stats = queue.stats();
        assert_eq!((stats.done, stats.in_flight), (1, 0));
        assert_eq!(
            queue.get_progress("J1").unwrap().stages_completed,
            vec![StageId::Verification]
        );
    }

    #[tokio::test]
    async fn test_submit_to_closed_queue_fails() {
        let (queue, receiver) = AnalysisQueue::new(1, 1);
        drop(receiver);

        assert!(queue.submit(message("J1")).await.is_err());
        assert_eq!(queue.get_progress("J1").unwrap().state, PipelineState::Failed);
        assert_eq!(queue.stats().in_flight, 0);
    }
}
