//! Stage agents: roster, report templates, and reasoners
//!
//! A stage is described by a [`StageSpec`] and executed by a
//! [`StageReasoner`]. The reasoner is chosen once per process; the tools it
//! may call are handed in per run through [`StageTools`].

mod llm;
mod roster;
mod rules;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{AnalyzerConfig, ReasonerKind};
use crate::error::Result;
use crate::providers::{LlmProvider, OllamaLlm};
use crate::tools::StageTools;

pub use llm::{LlmReasoner, ReactStep};
pub use roster::{report_body, ReportTemplate, StageSpec};
pub use rules::RuleBasedReasoner;

/// Identifier of an analysis stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Verification,
    FinancialAnalysis,
    InvestmentRecommendation,
    RiskAssessment,
}

impl StageId {
    /// Declaration order of the roster
    pub const ALL: [StageId; 4] = [
        StageId::Verification,
        StageId::FinancialAnalysis,
        StageId::InvestmentRecommendation,
        StageId::RiskAssessment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Verification => "verification",
            StageId::FinancialAnalysis => "financial_analysis",
            StageId::InvestmentRecommendation => "investment_recommendation",
            StageId::RiskAssessment => "risk_assessment",
        }
    }

    /// Human-readable name
    pub fn title(&self) -> &'static str {
        match self {
            StageId::Verification => "Document Verification",
            StageId::FinancialAnalysis => "Financial Analysis",
            StageId::InvestmentRecommendation => "Investment Recommendation",
            StageId::RiskAssessment => "Risk Assessment",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of one stage invocation
#[derive(Debug, Clone)]
pub struct StageContext {
    pub query: String,
    pub file_path: String,
    /// Outputs of the declared upstream stages, in declaration order
    pub upstream: Vec<(StageId, String)>,
}

impl StageContext {
    pub fn new(query: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            file_path: file_path.into(),
            upstream: Vec::new(),
        }
    }

    pub fn upstream_output(&self, stage: StageId) -> Option<&str> {
        self.upstream
            .iter()
            .find(|(id, _)| *id == stage)
            .map(|(_, output)| output.as_str())
    }

    /// Upstream outputs as one labelled block
    pub fn upstream_block(&self) -> String {
        self.upstream
            .iter()
            .map(|(id, output)| format!("[{}]\n{}", id.title(), output))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Produces a stage report from its context and tools
#[async_trait]
pub trait StageReasoner: Send + Sync {
    async fn execute(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Build the reasoner selected in configuration
///
/// An unreachable model server is only logged; stages fail at run time if
/// it is still down.
pub async fn reasoner_from_config(config: &AnalyzerConfig) -> Result<Arc<dyn StageReasoner>> {
    match config.reasoner {
        ReasonerKind::Rules => Ok(Arc::new(RuleBasedReasoner::new())),
        ReasonerKind::Ollama => {
            let llm = OllamaLlm::new(&config.llm)?;
            match llm.health_check().await {
                Ok(true) => tracing::info!(
                    "Ollama reachable at {} (model {})",
                    config.llm.base_url,
                    config.llm.generate_model
                ),
                Ok(false) | Err(_) => tracing::warn!(
                    "Ollama not reachable at {}; stages will fail until it is",
                    config.llm.base_url
                ),
            }
            Ok(Arc::new(LlmReasoner::new(Arc::new(llm))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_reasoner_is_default() {
        let reasoner = reasoner_from_config(&AnalyzerConfig::default())
            .await
            .unwrap();
        assert_eq!(reasoner.name(), "rules");
    }

    #[test]
    fn test_stage_ids() {
        assert_eq!(StageId::ALL[0], StageId::Verification);
        assert_eq!(StageId::FinancialAnalysis.to_string(), "financial_analysis");
        assert_eq!(
            serde_json::to_string(&StageId::RiskAssessment).unwrap(),
            "\"risk_assessment\""
        );
    }

    #[test]
    fn test_upstream_lookup() {
        let mut ctx = StageContext::new("q", "/tmp/a.pdf");
        ctx.upstream.push((StageId::Verification, "verified".to_string()));

        assert_eq!(ctx.upstream_output(StageId::Verification), Some("verified"));
        assert_eq!(ctx.upstream_output(StageId::RiskAssessment), None);
        assert_eq!(ctx.upstream_block(), "[Document Verification]\nverified");
    }
}
