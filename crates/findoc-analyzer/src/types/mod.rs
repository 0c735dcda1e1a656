//! Core types for the analyzer

pub mod job;

pub use job::{AnalysisMessage, Job, JobStatus, DEFAULT_QUERY};
