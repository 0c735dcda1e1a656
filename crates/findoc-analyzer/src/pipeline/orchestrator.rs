//! Sequential stage execution with per-stage timeouts

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::graph::StageGraph;
use crate::agents::{StageContext, StageId, StageReasoner, StageSpec};
use crate::config::{AnalyzerConfig, ToolConfig};
use crate::error::{Error, Result};
use crate::extraction::{strip_document_payload, ContentExtractor};
use crate::tools::ToolBox;

/// Joins stage outputs in the final result
pub const STAGE_SEPARATOR: &str = "\n\n=====================\n\n";

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Verifying,
    AnalyzingFinancials,
    RecommendingInvestment,
    AssessingRisk,
    Done,
    Failed,
}

impl PipelineState {
    /// State while a stage runs
    pub fn for_stage(stage: StageId) -> Self {
        match stage {
            StageId::Verification => PipelineState::Verifying,
            StageId::FinancialAnalysis => PipelineState::AnalyzingFinancials,
            StageId::InvestmentRecommendation => PipelineState::RecommendingInvestment,
            StageId::RiskAssessment => PipelineState::AssessingRisk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Pending => "pending",
            PipelineState::Verifying => "verifying",
            PipelineState::AnalyzingFinancials => "analyzing_financials",
            PipelineState::RecommendingInvestment => "recommending_investment",
            PipelineState::AssessingRisk => "assessing_risk",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Receives pipeline progress
pub trait PipelineObserver: Send + Sync {
    fn on_transition(&self, from: PipelineState, to: PipelineState);

    fn on_stage_complete(&self, _stage: StageId, _elapsed: Duration) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_transition(&self, _from: PipelineState, _to: PipelineState) {}
}

/// The four-stage analysis pipeline
pub struct Pipeline {
    specs: HashMap<StageId, StageSpec>,
    graph: StageGraph,
    reasoner: Arc<dyn StageReasoner>,
    tool_config: ToolConfig,
    extractor: ContentExtractor,
}

impl Pipeline {
    pub fn new(
        specs: Vec<StageSpec>,
        reasoner: Arc<dyn StageReasoner>,
        tool_config: ToolConfig,
        extractor: ContentExtractor,
    ) -> Result<Self> {
        let graph = StageGraph::from_specs(&specs)?;
        let specs = specs.into_iter().map(|spec| (spec.id, spec)).collect();

        Ok(Self {
            specs,
            graph,
            reasoner,
            tool_config,
            extractor,
        })
    }

    /// Standard roster with budgets and limits from configuration
    pub fn from_config(config: &AnalyzerConfig, reasoner: Arc<dyn StageReasoner>) -> Result<Self> {
        Self::new(
            StageSpec::roster(&config.stages),
            reasoner,
            config.tools.clone(),
            ContentExtractor::new(config.extraction.max_chars),
        )
    }

    pub fn stage_order(&self) -> &[StageId] {
        self.graph.order()
    }

    pub fn reasoner_name(&self) -> &str {
        self.reasoner.name()
    }

    /// Run every stage once; any stage error aborts the run
    pub async fn run(
        &self,
        query: &str,
        file_path: &str,
        observer: &dyn PipelineObserver,
    ) -> Result<String> {
        // Fresh tool instances, so usage counts are per run
        let toolbox = ToolBox::for_run(&self.tool_config, self.extractor.clone());
        let mut outputs: Vec<(StageId, String)> = Vec::with_capacity(self.specs.len());
        let mut state = PipelineState::Pending;

        for &stage in self.graph.order() {
            let spec = self
                .specs
                .get(&stage)
                .ok_or_else(|| Error::internal(format!("no spec for stage {}", stage)))?;

            let next = PipelineState::for_stage(stage);
            observer.on_transition(state, next);
            state = next;

            let mut context = StageContext::new(query, file_path);
            context.upstream = self
                .graph
                .upstream_of(stage)
                .iter()
                .filter_map(|id| {
                    outputs
                        .iter()
                        .find(|(done, _)| done == id)
                        .map(|(done, output)| (*done, output.clone()))
                })
                .collect();

            let tools = toolbox.scoped(stage, spec.tools);
            let started = Instant::now();
            tracing::info!("Stage {} started ({} reasoner)", stage, self.reasoner.name());

            let result = match tokio::time::timeout(
                spec.timeout,
                self.reasoner.execute(spec, &context, &tools),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::StageTimeout {
                    stage: stage.as_str().to_string(),
                    secs: spec.timeout.as_secs(),
                }),
            };

            match result {
                Ok(output) => {
                    let elapsed = started.elapsed();
                    tracing::info!("Stage {} completed in {:?}", stage, elapsed);
                    observer.on_stage_complete(stage, elapsed);
                    outputs.push((stage, strip_document_payload(output.trim())));
                }
                Err(e) => {
                    let completed: Vec<&str> = outputs.iter().map(|(id, _)| id.as_str()).collect();
                    tracing::error!(
                        "Stage {} failed after {:?}: {} (completed: [{}])",
                        stage,
                        started.elapsed(),
                        e,
                        completed.join(", ")
                    );
                    observer.on_transition(state, PipelineState::Failed);
                    return Err(Error::pipeline_failure(stage.as_str(), e));
                }
            }
        }

        observer.on_transition(state, PipelineState::Done);

        Ok(outputs
            .into_iter()
            .map(|(_, output)| output)
            .collect::<Vec<_>>()
            .join(STAGE_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::RuleBasedReasoner;
    use crate::config::StagesConfig;
    use crate::tools::{StageTools, ToolKind};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Reports which upstream outputs it saw
    struct EchoReasoner;

    #[async_trait]
    impl StageReasoner for EchoReasoner {
        async fn execute(
            &self,
            spec: &StageSpec,
            context: &StageContext,
            _tools: &StageTools<'_>,
        ) -> Result<String> {
            let seen: Vec<&str> = context.upstream.iter().map(|(id, _)| id.as_str()).collect();
            Ok(format!("{} saw [{}]", spec.id, seen.join(",")))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    /// Sleeps past the deadline in one stage
    struct StallingReasoner(StageId);

    #[async_trait]
    impl StageReasoner for StallingReasoner {
        async fn execute(
            &self,
            spec: &StageSpec,
            _context: &StageContext,
            _tools: &StageTools<'_>,
        ) -> Result<String> {
            if spec.id == self.0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(spec.id.to_string())
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PipelineState>>);

    impl PipelineObserver for Recorder {
        fn on_transition(&self, _from: PipelineState, to: PipelineState) {
            self.0.lock().push(to);
        }
    }

    fn pipeline(reasoner: Arc<dyn StageReasoner>, stages: StagesConfig) -> Pipeline {
        Pipeline::new(
            StageSpec::roster(&stages),
            reasoner,
            ToolConfig::default(),
            ContentExtractor::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_outputs_joined_in_stage_order() {
        let recorder = Recorder::default();
        let result = pipeline(Arc::new(EchoReasoner), StagesConfig::default())
            .run("q", "/tmp/doc.pdf", &recorder)
            .await
            .unwrap();

        let parts: Vec<&str> = result.split(STAGE_SEPARATOR).collect();
        assert_eq!(
            parts,
            vec![
                "verification saw []",
                "financial_analysis saw [verification]",
                "investment_recommendation saw [financial_analysis]",
                "risk_assessment saw [financial_analysis]",
            ]
        );
        assert_eq!(
            *recorder.0.lock(),
            vec![
                PipelineState::Verifying,
                PipelineState::AnalyzingFinancials,
                PipelineState::RecommendingInvestment,
                PipelineState::AssessingRisk,
                PipelineState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_stage_timeout_aborts_pipeline() {
        let mut stages = StagesConfig::default();
        stages.investment_recommendation.timeout_secs = 1;
        let recorder = Recorder::default();

        let err = pipeline(
            Arc::new(StallingReasoner(StageId::InvestmentRecommendation)),
            stages,
        )
        .run("q", "/tmp/doc.pdf", &recorder)
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::PipelineFailure { ref stage, .. } if stage == "investment_recommendation"
        ));
        assert!(matches!(err.root_cause(), Error::StageTimeout { secs: 1, .. }));
        assert_eq!(recorder.0.lock().last(), Some(&PipelineState::Failed));
        assert!(!recorder.0.lock().contains(&PipelineState::AssessingRisk));
    }

    #[tokio::test]
    async fn test_document_payload_never_leaves_a_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Confidential revenue table").unwrap();

        /// Returns the raw reader output as its report
        struct LeakyReasoner;

        #[async_trait]
        impl StageReasoner for LeakyReasoner {
            async fn execute(
                &self,
                spec: &StageSpec,
                context: &StageContext,
                tools: &StageTools<'_>,
            ) -> Result<String> {
                if tools.allows(ToolKind::ReadDocument) {
                    let payload = tools.call(ToolKind::ReadDocument, &context.file_path).await?;
                    return Ok(format!("{} report\n{}", spec.id, payload));
                }
                Ok(spec.id.to_string())
            }

            fn name(&self) -> &str {
                "leaky"
            }
        }

        let result = pipeline(Arc::new(LeakyReasoner), StagesConfig::default())
            .run("q", path.to_str().unwrap(), &NoopObserver)
            .await
            .unwrap();

        assert!(!result.contains("Confidential revenue table"));
        assert!(result.contains("[document content omitted]"));
    }

    #[tokio::test]
    async fn test_rule_pipeline_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.txt");
        std::fs::write(&path, "Revenue rose, net income rose, debt fell by 3%.").unwrap();

        let pipeline = pipeline(Arc::new(RuleBasedReasoner::new()), StagesConfig::default());
        let first = pipeline.run("q", path.to_str().unwrap(), &NoopObserver).await.unwrap();
        let second = pipeline.run("q", path.to_str().unwrap(), &NoopObserver).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.split(STAGE_SEPARATOR).count(), 4);
    }
}
