//! Analysis tools invoked by stage agents
//!
//! Every tool instance carries its own usage counter. A [`ToolBox`] owns one
//! instance of each tool and is built fresh for every pipeline run, so counts
//! never leak between jobs or workers.

mod document_reader;
mod insight;
mod investment;
mod risk;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::agents::StageId;
use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::extraction::ContentExtractor;

pub use document_reader::DocumentReaderTool;
pub use insight::{InsightReport, InsightRules, KeywordRule};
pub use investment::{InvestmentTool, INVESTMENT_RULES};
pub use risk::{RiskTool, RISK_RULES};

/// Identifies a tool in whitelists and prompts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadDocument,
    InvestmentAnalysis,
    RiskAssessment,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::ReadDocument,
        ToolKind::InvestmentAnalysis,
        ToolKind::RiskAssessment,
    ];

    /// Name the tool is called by
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ReadDocument => "read_data_tool",
            ToolKind::InvestmentAnalysis => "investment_analysis_tool",
            ToolKind::RiskAssessment => "risk_assessment_tool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_matches('`');
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Per-instance invocation counter with a hard cap
#[derive(Debug)]
pub struct UsageLimiter {
    used: AtomicU32,
    max: u32,
}

impl UsageLimiter {
    pub fn new(max: u32) -> Self {
        Self {
            used: AtomicU32::new(0),
            max,
        }
    }

    /// Claim one invocation, rejecting once the cap is reached
    pub fn acquire(&self, tool: &str) -> Result<u32> {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max).then_some(used + 1)
            })
            .map(|previous| previous + 1)
            .map_err(|_| Error::ToolUsageExceeded {
                tool: tool.to_string(),
                max: self.max,
            })
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

/// A text-analysis tool with a bounded number of invocations
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Description shown to the reasoner
    fn description(&self) -> &'static str;

    fn usage(&self) -> &UsageLimiter;

    /// Tool body; internal failures come back as `Error: <message>` text
    async fn run(&self, input: &str) -> String;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Count the call, then run. Only the usage cap surfaces as `Err`.
    async fn invoke(&self, input: &str) -> Result<String> {
        let call = self.usage().acquire(self.name())?;
        tracing::debug!("{} call {}/{}", self.name(), call, self.usage().max());
        Ok(self.run(input).await)
    }
}

/// The tool instances of one pipeline run
pub struct ToolBox {
    reader: DocumentReaderTool,
    investment: InvestmentTool,
    risk: RiskTool,
}

impl ToolBox {
    /// Build fresh instances with zeroed counters
    pub fn for_run(config: &ToolConfig, extractor: ContentExtractor) -> Self {
        Self {
            reader: DocumentReaderTool::new(extractor, config.max_usage_count),
            investment: InvestmentTool::new(config.max_usage_count, config.checksum_window),
            risk: RiskTool::new(config.max_usage_count, config.checksum_window),
        }
    }

    pub fn get(&self, kind: ToolKind) -> &dyn Tool {
        match kind {
            ToolKind::ReadDocument => &self.reader,
            ToolKind::InvestmentAnalysis => &self.investment,
            ToolKind::RiskAssessment => &self.risk,
        }
    }

    /// View restricted to a stage's whitelist
    pub fn scoped<'a>(&'a self, stage: StageId, allowed: &'a [ToolKind]) -> StageTools<'a> {
        StageTools {
            stage,
            allowed,
            toolbox: self,
        }
    }
}

/// Tools one stage may call
pub struct StageTools<'a> {
    stage: StageId,
    allowed: &'a [ToolKind],
    toolbox: &'a ToolBox,
}

impl<'a> StageTools<'a> {
    pub fn allows(&self, kind: ToolKind) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn allowed(&self) -> &'a [ToolKind] {
        self.allowed
    }

    /// Invoke a whitelisted tool
    pub async fn call(&self, kind: ToolKind, input: &str) -> Result<String> {
        if !self.allows(kind) {
            return Err(Error::ToolNotPermitted {
                stage: self.stage.as_str().to_string(),
                tool: kind.name().to_string(),
            });
        }
        self.toolbox.get(kind).invoke(input).await
    }

    /// Invoke by the name a reasoner produced
    pub async fn call_by_name(&self, name: &str, input: &str) -> Result<String> {
        match ToolKind::from_name(name) {
            Some(kind) => self.call(kind, input).await,
            None => Err(Error::ToolNotPermitted {
                stage: self.stage.as_str().to_string(),
                tool: name.trim().to_string(),
            }),
        }
    }

    /// Name and description of each allowed tool
    pub fn catalogue(&self) -> Vec<(&'static str, &'static str)> {
        self.allowed
            .iter()
            .map(|kind| {
                let tool = self.toolbox.get(*kind);
                (tool.name(), tool.description())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolbox() -> ToolBox {
        ToolBox::for_run(&ToolConfig::default(), ContentExtractor::default())
    }

    #[test]
    fn test_usage_limiter_rejects_after_cap() {
        let limiter = UsageLimiter::new(3);
        assert_eq!(limiter.acquire("t").unwrap(), 1);
        assert_eq!(limiter.acquire("t").unwrap(), 2);
        assert_eq!(limiter.acquire("t").unwrap(), 3);
        assert!(matches!(
            limiter.acquire("t"),
            Err(Error::ToolUsageExceeded { max: 3, .. })
        ));
        assert_eq!(limiter.used(), 3);
    }

    #[tokio::test]
    async fn test_fourth_call_is_rejected() {
        let tools = toolbox();
        let investment = tools.get(ToolKind::InvestmentAnalysis);

        for _ in 0..3 {
            let out = investment.invoke("revenue and growth").await.unwrap();
            assert!(out.starts_with("Investment Insight:"));
        }

        let err = investment.invoke("revenue and growth").await.unwrap_err();
        assert!(matches!(err, Error::ToolUsageExceeded { ref tool, max: 3 } if tool == "investment_analysis_tool"));
    }

    #[tokio::test]
    async fn test_fresh_toolbox_has_fresh_counters() {
        let first = toolbox();
        for _ in 0..3 {
            first.get(ToolKind::RiskAssessment).invoke("risk").await.unwrap();
        }
        assert!(first.get(ToolKind::RiskAssessment).invoke("risk").await.is_err());

        let second = toolbox();
        assert!(second.get(ToolKind::RiskAssessment).invoke("risk").await.is_ok());
    }

    #[tokio::test]
    async fn test_scoped_tools_enforce_whitelist() {
        let tools = toolbox();
        let allowed = [ToolKind::ReadDocument];
        let scoped = tools.scoped(StageId::Verification, &allowed);

        let err = scoped
            .call(ToolKind::RiskAssessment, "risk")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotPermitted { .. }));

        let err = scoped.call_by_name("shell", "ls").await.unwrap_err();
        assert!(matches!(err, Error::ToolNotPermitted { ref tool, .. } if tool == "shell"));

        // Rejected calls do not consume the tool's budget
        assert_eq!(tools.get(ToolKind::RiskAssessment).usage().used(), 0);
        assert_eq!(scoped.catalogue().len(), 1);
    }

    #[test]
    fn test_tool_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("`read_data_tool`"), Some(ToolKind::ReadDocument));
    }
}
