//! findoc-analyzer: asynchronous financial document analysis
//!
//! Uploaded documents become jobs. A pool of workers runs each job through a
//! fixed graph of analysis stages (verification, financial analysis,
//! investment recommendation, risk assessment). Stages call usage-limited
//! tools and either a rule-based or an LLM-backed reasoner. Outcomes are
//! stored in SQLite and served over HTTP.

pub mod agents;
pub mod config;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod pipeline;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod tools;
pub mod types;

pub use agents::{StageId, StageReasoner};
pub use config::AnalyzerConfig;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineState};
pub use processing::{AnalysisQueue, AnalysisWorker};
pub use storage::{JobStore, SqliteJobStore};
pub use types::{AnalysisMessage, Job, JobStatus};
