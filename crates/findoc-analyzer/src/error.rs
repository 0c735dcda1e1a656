//! Error types for the analysis pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Analyzer errors
#[derive(Debug, Error)]
pub enum Error {
    /// Source document missing at its path
    #[error("NotFound: source document does not exist: {0}")]
    InputNotFound(String),

    /// No text could be recovered from the document
    #[error("EmptyExtraction: no readable content in {0}")]
    EmptyExtraction(String),

    /// A tool was invoked more times than its cap allows
    #[error("Tool '{tool}' usage limit exceeded ({max} calls per run)")]
    ToolUsageExceeded { tool: String, max: u32 },

    /// A stage asked for a tool outside its whitelist
    #[error("Stage '{stage}' is not permitted to use tool '{tool}'")]
    ToolNotPermitted { stage: String, tool: String },

    /// A stage exceeded its wall-clock budget
    #[error("Stage '{stage}' timed out after {secs}s")]
    StageTimeout { stage: String, secs: u64 },

    /// Unrecoverable error inside a stage
    #[error("Stage '{stage}' failed: {message}")]
    StageFailure { stage: String, message: String },

    /// The pipeline aborted because a stage failed
    #[error("Pipeline failed at stage '{stage}': {source}")]
    PipelineFailure {
        stage: String,
        #[source]
        source: Box<Error>,
    },

    /// Job store write or read error
    #[error("Persistence error: {0}")]
    PersistenceFailure(String),

    /// Job status change that the lifecycle forbids
    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ollama/LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a stage failure
    pub fn stage_failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Wrap a stage error as a whole-pipeline failure
    pub fn pipeline_failure(stage: impl Into<String>, source: Error) -> Self {
        Self::PipelineFailure {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceFailure(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Innermost cause of a pipeline failure
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::PipelineFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::PersistenceFailure(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::InputNotFound(_) => (StatusCode::BAD_REQUEST, "input_not_found"),
            Error::EmptyExtraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "empty_extraction"),
            Error::ToolUsageExceeded { .. } | Error::ToolNotPermitted { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "tool_error")
            }
            Error::StageTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "stage_timeout"),
            Error::StageFailure { .. } | Error::PipelineFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "pipeline_error")
            }
            Error::PersistenceFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error"),
            Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            Error::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::Llm(_) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "status": "error",
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
