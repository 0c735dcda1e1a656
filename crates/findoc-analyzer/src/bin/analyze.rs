//! One-shot analysis of a local document
//!
//! Run with: cargo run -p findoc-analyzer --features cli --bin findoc-analyze -- report.pdf

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use findoc_analyzer::agents::{reasoner_from_config, StageId};
use findoc_analyzer::config::{AnalyzerConfig, ReasonerKind};
use findoc_analyzer::pipeline::{Pipeline, PipelineObserver, PipelineState};
use findoc_analyzer::types::DEFAULT_QUERY;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "findoc-analyze")]
#[command(about = "Run the financial analysis pipeline on one document")]
struct Cli {
    /// Document to analyze (PDF or plain text); it is left in place
    file: PathBuf,

    /// Question to answer about the document
    #[arg(long, short, default_value = DEFAULT_QUERY)]
    query: String,

    /// Override the configured reasoner
    #[arg(long, value_enum)]
    reasoner: Option<ReasonerArg>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReasonerArg {
    Rules,
    Ollama,
}

impl From<ReasonerArg> for ReasonerKind {
    fn from(arg: ReasonerArg) -> Self {
        match arg {
            ReasonerArg::Rules => ReasonerKind::Rules,
            ReasonerArg::Ollama => ReasonerKind::Ollama,
        }
    }
}

/// Prints stage progress to stderr
struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_transition(&self, _from: PipelineState, to: PipelineState) {
        eprintln!("-> {}", to.as_str());
    }

    fn on_stage_complete(&self, stage: StageId, elapsed: Duration) {
        eprintln!("   {} done in {:.1}s", stage.title(), elapsed.as_secs_f32());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "findoc_analyzer=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AnalyzerConfig::load()?,
    };
    if let Some(reasoner) = cli.reasoner {
        config.reasoner = reasoner.into();
    }

    let file = cli
        .file
        .canonicalize()
        .with_context(|| format!("document not found: {}", cli.file.display()))?;
    let file_path = file.to_string_lossy();

    let reasoner = reasoner_from_config(&config).await?;
    let pipeline = Pipeline::from_config(&config, reasoner)?;

    let report = pipeline
        .run(cli.query.trim(), &file_path, &ConsoleObserver)
        .await
        .context("analysis failed")?;

    println!("{}", report);
    Ok(())
}
