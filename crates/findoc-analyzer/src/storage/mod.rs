//! Job store: durable record of every analysis job
//!
//! A job moves `processing -> completed` or `processing -> failed` exactly
//! once; terminal rows only change through [`JobStore::reset_for_rerun`].

mod database;

use crate::error::Result;
use crate::types::Job;

pub use database::SqliteJobStore;

/// Persistence contract for analysis jobs
pub trait JobStore: Send + Sync {
    /// Insert a new job; it must be in `processing`
    fn create(&self, job: &Job) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Job>>;

    /// `processing -> completed` with the final report
    fn complete(&self, id: &str, result: &str) -> Result<()>;

    /// `processing -> failed` with the error description
    fn fail(&self, id: &str, message: &str) -> Result<()>;

    /// Put a terminal job back into `processing` with an empty result
    fn reset_for_rerun(&self, id: &str) -> Result<()>;

    /// Most recent jobs first
    fn list_recent(&self, limit: usize) -> Result<Vec<Job>>;
}
