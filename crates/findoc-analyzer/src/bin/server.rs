//! Analyzer server binary
//!
//! Run with: cargo run -p findoc-analyzer --bin findoc-analyzer-server

use findoc_analyzer::{config::AnalyzerConfig, server::AnalyzerServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "findoc_analyzer=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AnalyzerConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Reasoner: {:?}", config.reasoner);
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Uploads: {}", config.storage.upload_dir.display());
    tracing::info!("  - Workers: {}", config.processing.resolved_workers());
    tracing::info!("  - Tool usage limit: {}", config.tools.max_usage_count);

    let server = AnalyzerServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("\nEndpoints:");
    println!("  POST /analyze      - Upload a financial document");
    println!("  GET  /result/:id   - Fetch the analysis result");
    println!("  GET  /jobs/stats   - Queue statistics");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
