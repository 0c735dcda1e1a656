//! Document submission and result endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::pipeline::PipelineState;
use crate::server::state::AppState;
use crate::types::{AnalysisMessage, Job, JobStatus, DEFAULT_QUERY};

/// Response from a submission
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: JobStatus,
    pub analysis_id: String,
    pub message: String,
}

/// Stored outcome of a job
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub analysis_id: String,
    pub file_name: String,
    pub query: String,
    pub status: JobStatus,
    pub result: String,
    pub created_at: DateTime<Utc>,
    /// Current stage while the job is still processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineState>,
}

/// POST /analyze - Upload a document and queue its analysis
pub async fn analyze_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AnalyzeResponse>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut query: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::internal(format!("Failed to read multipart field: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "document.pdf".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::internal(format!("Failed to read upload: {}", e)))?;
                upload = Some((file_name, data.to_vec()));
            }
            "query" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::internal(format!("Failed to read query: {}", e)))?;
                query = Some(text);
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let (file_name, data) =
        upload.ok_or_else(|| Error::internal("No file provided in field 'file'"))?;

    let query = query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    let job = Job::new(&file_name, query);
    let path = state.upload_path(&job.id, &file_name);

    tokio::fs::write(&path, &data).await?;
    tracing::info!(
        "Saved upload '{}' ({} bytes) for job {}",
        file_name,
        data.len(),
        job.id
    );

    if let Err(e) = state.store().create(&job) {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }

    let message = AnalysisMessage::for_job(&job, path.to_string_lossy());
    if let Err(e) = state.queue().submit(message).await {
        if let Err(store_err) = state.store().fail(&job.id, &e.to_string()) {
            tracing::error!("Failed to record failure of job {}: {}", job.id, store_err);
        }
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            status: JobStatus::Processing,
            message: format!("Analysis started. Use /result/{}", job.id),
            analysis_id: job.id,
        }),
    ))
}

/// GET /result/:id - Stored outcome of a job
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let Some(job) = state.store().get(&id)? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "message": "Analysis ID not found",
            })),
        )
            .into_response());
    };

    let stage = if job.status.is_terminal() {
        None
    } else {
        state.queue().get_progress(&id).map(|p| p.state)
    };

    Ok(Json(ResultResponse {
        analysis_id: job.id,
        file_name: job.file_name,
        query: job.query,
        status: job.status,
        result: job.result,
        created_at: job.created_at,
        stage,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::processing::AnalysisQueue;
    use crate::server::routes::api_routes;
    use crate::storage::SqliteJobStore;
    use axum::{body::Body, http::Request, Router};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "findoc-test-boundary";

    struct Harness {
        _dir: tempfile::TempDir,
        state: AppState,
        router: Router,
        receiver: mpsc::Receiver<AnalysisMessage>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AnalyzerConfig::default();
        config.storage.upload_dir = dir.path().join("uploads");

        let (queue, receiver) = AnalysisQueue::new(1, 8);
        let state = AppState::new(
            config,
            Arc::new(SqliteJobStore::in_memory().unwrap()),
            Arc::new(queue),
        )
        .unwrap();
        let router = api_routes(1024 * 1024).with_state(state.clone());

        Harness {
            _dir: dir,
            state,
            router,
            receiver,
        }
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                    name, f
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    fn upload_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_saves_upload_and_queues_job() {
        let mut h = harness();
        let body = multipart_body(&[
            ("file", Some("q3.pdf"), "Revenue grew 12%"),
            ("query", None, "  Summarize risk  "),
        ]);

        let response = h.router.clone().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let json = json_body(response).await;
        assert_eq!(json["status"], "processing");
        let id = json["analysis_id"].as_str().unwrap().to_string();
        assert_eq!(
            json["message"],
            format!("Analysis started. Use /result/{}", id)
        );

        let message = h.receiver.recv().await.unwrap();
        assert_eq!(message.job_id, id);
        assert_eq!(message.query, "Summarize risk");
        assert_eq!(message.file_name, "q3.pdf");
        assert!(message
            .file_path
            .ends_with(&format!("financial_document_{}.pdf", id)));
        assert_eq!(
            std::fs::read_to_string(&message.file_path).unwrap(),
            "Revenue grew 12%"
        );

        let job = h.state.store().get(&id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_blank_query_uses_default() {
        let mut h = harness();
        let body = multipart_body(&[("file", Some("annual.pdf"), "text"), ("query", None, "   ")]);

        let response = h.router.clone().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(h.receiver.recv().await.unwrap().query, DEFAULT_QUERY);
    }

    #[tokio::test]
    async fn test_missing_file_field_is_server_error() {
        let h = harness();
        let body = multipart_body(&[("query", None, "anything")]);

        let response = h.router.clone().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_result_reports_stored_job() {
        let h = harness();
        let job = Job::with_id("J1", "q3.pdf", "Summarize");
        h.state.store().create(&job).unwrap();
        h.state.store().complete("J1", "report").unwrap();

        let response = h
            .router
            .clone()
            .oneshot(Request::get("/result/J1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["analysis_id"], "J1");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"], "report");
        assert!(json.get("stage").is_none());
    }

    #[tokio::test]
    async fn test_unknown_result_is_not_found() {
        let h = harness();
        let response = h
            .router
            .clone()
            .oneshot(Request::get("/result/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Analysis ID not found");
    }
}
