//! Analysis job records and queue messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Default query when a submission carries none
pub const DEFAULT_QUERY: &str = "Analyze this financial document for investment insights";

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted; a worker owns it or will
    Processing,
    /// Pipeline finished; result holds the report
    Completed,
    /// Pipeline aborted; result holds the error description
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::persistence(format!("unknown job status '{}'", other))),
        }
    }
}

/// One analysis request and its outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub file_name: String,
    pub query: String,
    pub status: JobStatus,
    /// Empty until terminal
    pub result: String,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// New job in `processing` with a fresh identifier
    pub fn new(file_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), file_name, query)
    }

    pub fn with_id(
        id: impl Into<String>,
        file_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            query: query.into(),
            status: JobStatus::Processing,
            result: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Work item handed from submission to a worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisMessage {
    pub job_id: String,
    pub query: String,
    pub file_path: String,
    pub file_name: String,
}

impl AnalysisMessage {
    pub fn for_job(job: &Job, file_path: impl Into<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            query: job.query.trim().to_string(),
            file_path: file_path.into(),
            file_name: job.file_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_processing() {
        let job = Job::new("q3.pdf", DEFAULT_QUERY);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result.is_empty());
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
    }

    #[test]
    fn test_status_strings() {
        for status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_message_trims_query() {
        let job = Job::with_id("J1", "q3.pdf", "  growth?  ");
        let msg = AnalysisMessage::for_job(&job, "/data/financial_document_J1.pdf");
        assert_eq!(msg.query, "growth?");
        assert_eq!(msg.job_id, "J1");
    }
}
