//! Background processing with a job queue and worker pool

mod job_queue;
mod worker;

pub use job_queue::{AnalysisQueue, ProgressObserver, QueueStats, RunProgress};
pub use worker::{spawn_workers, AnalysisWorker};
