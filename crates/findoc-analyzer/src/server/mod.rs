//! HTTP server for the analyzer

pub mod routes;
pub mod state;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::agents::reasoner_from_config;
use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::processing::{spawn_workers, AnalysisQueue, AnalysisWorker};
use crate::storage::{JobStore, SqliteJobStore};
use state::AppState;

/// Analyzer HTTP server with its worker pool
pub struct AnalyzerServer {
    config: AnalyzerConfig,
    state: AppState,
    workers: Vec<JoinHandle<()>>,
}

impl AnalyzerServer {
    /// Open the job store, build the pipeline, and start the workers
    pub async fn new(config: AnalyzerConfig) -> Result<Self> {
        let store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(&config.storage.database_path)?);

        let reasoner = reasoner_from_config(&config).await?;
        let pipeline = Arc::new(Pipeline::from_config(&config, reasoner)?);
        tracing::info!(
            "Pipeline ready: reasoner={}, stages={:?}",
            pipeline.reasoner_name(),
            pipeline.stage_order()
        );

        let worker_count = config.processing.resolved_workers();
        let (queue, receiver) = AnalysisQueue::new(worker_count, config.processing.queue_capacity);
        let queue = Arc::new(queue);

        let worker = Arc::new(
            AnalysisWorker::new(Arc::clone(&store), pipeline).with_progress(Arc::clone(&queue)),
        );
        let workers = spawn_workers(worker, receiver, worker_count);

        let state = AppState::new(config.clone(), store, queue)?;
        Ok(Self {
            config,
            state,
            workers,
        })
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        router(self.state.clone(), &self.config)
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting analyzer server on http://{}", addr);
        tracing::info!("{} analysis workers running", self.workers.len());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over existing state
pub fn router(state: AppState, config: &AnalyzerConfig) -> Router {
    let router = routes::api_routes(config.server.max_upload_size)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}
