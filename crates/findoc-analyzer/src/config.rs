//! Configuration for the analyzer service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agents::StageId;
use crate::error::{Error, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "FINDOC_CONFIG";

/// Main analyzer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Job store and upload locations
    pub storage: StorageConfig,
    /// Queue and worker pool configuration
    pub processing: ProcessingConfig,
    /// Content extraction limits
    pub extraction: ExtractionConfig,
    /// Analysis tool limits
    pub tools: ToolConfig,
    /// Per-stage iteration and time budgets
    pub stages: StagesConfig,
    /// Which reasoner drives the stages
    pub reasoner: ReasonerKind,
    /// Ollama/LLM configuration (used when reasoner = ollama)
    pub llm: LlmConfig,
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Load from `FINDOC_CONFIG` if set, otherwise defaults, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply selected environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("FINDOC_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("FINDOC_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid FINDOC_PORT '{}': {}", port, e)))?;
        }
        if let Ok(path) = std::env::var("FINDOC_DATABASE") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("FINDOC_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Ok(workers) = std::env::var("FINDOC_WORKERS") {
            let count: usize = workers.parse().map_err(|e| {
                Error::Config(format!("Invalid FINDOC_WORKERS '{}': {}", workers, e))
            })?;
            self.processing.worker_count = Some(count);
        }
        if let Ok(kind) = std::env::var("FINDOC_REASONER") {
            self.reasoner = match kind.to_lowercase().as_str() {
                "rules" => ReasonerKind::Rules,
                "ollama" => ReasonerKind::Ollama,
                other => {
                    return Err(Error::Config(format!("Unknown reasoner '{}'", other)));
                }
            };
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            self.llm.base_url = url;
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite job store path
    pub database_path: PathBuf,
    /// Directory where uploaded documents wait for their worker
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("findoc-analyzer");

        Self {
            database_path: base.join("jobs.db"),
            upload_dir: base.join("data"),
        }
    }
}

/// Queue and worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of workers pulling from the queue (default: CPU count, max 4)
    pub worker_count: Option<usize>,
    /// Capacity of the in-process queue
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_capacity: 1000,
        }
    }
}

impl ProcessingConfig {
    /// Resolve the worker count, auto-detecting from the CPU count
    pub fn resolved_workers(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Content extraction limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Characters kept after normalization (checksum covers only these)
    pub max_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { max_chars: 10_000 }
    }
}

/// Analysis tool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Invocations allowed per tool instance per pipeline run
    pub max_usage_count: u32,
    /// Leading characters of the lower-cased input covered by insight checksums
    pub checksum_window: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_usage_count: 3,
            checksum_window: 3000,
        }
    }
}

/// Iteration and wall-clock budget of one stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageLimits {
    /// Maximum reasoning iterations
    pub max_iterations: u32,
    /// Hard wall-clock ceiling in seconds
    pub timeout_secs: u64,
}

impl StageLimits {
    pub const fn new(max_iterations: u32, timeout_secs: u64) -> Self {
        Self {
            max_iterations,
            timeout_secs,
        }
    }
}

/// Budgets for every stage in the roster
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub verification: StageLimits,
    pub financial_analysis: StageLimits,
    pub investment_recommendation: StageLimits,
    pub risk_assessment: StageLimits,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            verification: StageLimits::new(2, 60),
            financial_analysis: StageLimits::new(2, 60),
            investment_recommendation: StageLimits::new(1, 60),
            risk_assessment: StageLimits::new(2, 60),
        }
    }
}

impl StagesConfig {
    /// Limits configured for a stage
    pub fn limits_for(&self, stage: StageId) -> StageLimits {
        match stage {
            StageId::Verification => self.verification,
            StageId::FinancialAnalysis => self.financial_analysis,
            StageId::InvestmentRecommendation => self.investment_recommendation,
            StageId::RiskAssessment => self.risk_assessment,
        }
    }
}

/// Reasoner selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasonerKind {
    /// Deterministic reports built from tool output
    #[default]
    Rules,
    /// ReAct loop against an Ollama model
    Ollama,
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3:8b-instruct".to_string(),
            temperature: 0.3,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stage_roster() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.extraction.max_chars, 10_000);
        assert_eq!(config.tools.max_usage_count, 3);
        assert_eq!(
            config.stages.limits_for(StageId::InvestmentRecommendation),
            StageLimits::new(1, 60)
        );
        assert_eq!(config.reasoner, ReasonerKind::Rules);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            reasoner = "ollama"

            [server]
            port = 9100

            [stages.risk_assessment]
            max_iterations = 4
            timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.reasoner, ReasonerKind::Ollama);
        assert_eq!(config.stages.risk_assessment, StageLimits::new(4, 30));
        assert_eq!(config.stages.verification, StageLimits::new(2, 60));
    }

    #[test]
    fn test_resolved_workers_is_at_least_one() {
        let processing = ProcessingConfig {
            worker_count: Some(0),
            queue_capacity: 10,
        };
        assert_eq!(processing.resolved_workers(), 1);
    }
}
