//! Risk indicator tool

use async_trait::async_trait;

use super::insight::{InsightRules, KeywordRule};
use super::{Tool, ToolKind, UsageLimiter};

/// Risk indicator rules, in report order
pub const RISK_RULES: InsightRules = InsightRules {
    header: "Risk Overview",
    no_data: "No financial data provided",
    gate: &["revenue", "income", "cash", "risk", "decline"],
    insufficient: "Insufficient risk indicators",
    rules: &[
        KeywordRule {
            any_of: &["decline", "decrease"],
            insight: "Revenue or profitability decline risk",
        },
        KeywordRule { any_of: &["cash flow"], insight: "Cash flow fluctuation risk" },
        KeywordRule { any_of: &["debt", "liabilities"], insight: "Debt exposure risk" },
        KeywordRule {
            any_of: &["uncertain", "uncertainty"],
            insight: "Macroeconomic uncertainty risk",
        },
        KeywordRule { any_of: &["tariff"], insight: "Trade and tariff risk" },
        KeywordRule {
            any_of: &["operating margin"],
            insight: "Operating margin compression risk",
        },
    ],
    fallback: "No major financial risks detected",
};

/// Identifies liquidity, operational, financial, and market risks
pub struct RiskTool {
    usage: UsageLimiter,
    checksum_window: usize,
}

impl RiskTool {
    pub fn new(max_usage: u32, checksum_window: usize) -> Self {
        Self {
            usage: UsageLimiter::new(max_usage),
            checksum_window,
        }
    }
}

#[async_trait]
impl Tool for RiskTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RiskAssessment
    }

    fn description(&self) -> &'static str {
        "Analyzes financial content to identify liquidity, operational, financial, \
         and market risks. Input: financial text."
    }

    fn usage(&self) -> &UsageLimiter {
        &self.usage
    }

    async fn run(&self, input: &str) -> String {
        RISK_RULES.analyze(input, self.checksum_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::InsightReport;

    #[tokio::test]
    async fn test_no_risk_keywords_returns_single_line() {
        let tool = RiskTool::new(3, 3000);
        let out = tool
            .invoke("Quarterly headcount and office locations.")
            .await
            .unwrap();

        assert_eq!(out, "Risk Overview:\n- Insufficient risk indicators");
        assert!(!out.contains("CHECKSUM"));
    }

    #[tokio::test]
    async fn test_risk_detection_order() {
        let tool = RiskTool::new(3, 3000);
        let out = tool
            .invoke("Tariff uncertainty, total liabilities up, cash flow decrease, operating margin down")
            .await
            .unwrap();
        let report = InsightReport::parse(&out).unwrap();

        assert_eq!(
            report.items,
            vec![
                "Revenue or profitability decline risk",
                "Cash flow fluctuation risk",
                "Debt exposure risk",
                "Macroeconomic uncertainty risk",
                "Trade and tariff risk",
                "Operating margin compression risk",
            ]
        );
    }

    #[tokio::test]
    async fn test_gated_input_without_predicates() {
        let tool = RiskTool::new(3, 3000);
        let report = InsightReport::parse(&tool.invoke("Revenue was flat").await.unwrap()).unwrap();
        assert_eq!(report.items, vec!["No major financial risks detected"]);
    }
}
