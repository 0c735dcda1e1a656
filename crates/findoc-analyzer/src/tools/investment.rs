//! Investment indicator tool

use async_trait::async_trait;

use super::insight::{InsightRules, KeywordRule};
use super::{Tool, ToolKind, UsageLimiter};

/// Investment indicator rules, in report order
pub const INVESTMENT_RULES: InsightRules = InsightRules {
    header: "Investment Insight",
    no_data: "No financial data provided",
    gate: &["revenue", "income", "cash", "margin", "growth"],
    insufficient: "Insufficient financial indicators",
    rules: &[
        KeywordRule { any_of: &["revenue"], insight: "Revenue trends identified" },
        KeywordRule { any_of: &["net income"], insight: "Profitability indicators present" },
        KeywordRule { any_of: &["cash flow"], insight: "Positive operating cash flow indicators" },
        KeywordRule { any_of: &["free cash flow"], insight: "Free cash flow metrics identified" },
        KeywordRule { any_of: &["growth"], insight: "Business growth indicators present" },
        KeywordRule {
            any_of: &["decline", "decrease"],
            insight: "Negative financial performance indicators",
        },
        KeywordRule { any_of: &["margin"], insight: "Profit margin data available" },
    ],
    fallback: "No major investment indicators detected",
};

/// Identifies profitability, growth, and financial-strength indicators
pub struct InvestmentTool {
    usage: UsageLimiter,
    checksum_window: usize,
}

impl InvestmentTool {
    pub fn new(max_usage: u32, checksum_window: usize) -> Self {
        Self {
            usage: UsageLimiter::new(max_usage),
            checksum_window,
        }
    }
}

#[async_trait]
impl Tool for InvestmentTool {
    fn kind(&self) -> ToolKind {
        ToolKind::InvestmentAnalysis
    }

    fn description(&self) -> &'static str {
        "Analyzes financial data and identifies investment indicators including \
         profitability, growth, and financial strength. Input: financial text."
    }

    fn usage(&self) -> &UsageLimiter {
        &self.usage
    }

    async fn run(&self, input: &str) -> String {
        INVESTMENT_RULES.analyze(input, self.checksum_window)
    }
}
