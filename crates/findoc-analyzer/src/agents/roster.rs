//! The fixed roster of analysis stages

use std::time::Duration;

use super::{StageContext, StageId};
use crate::config::StagesConfig;
use crate::tools::ToolKind;

/// Title and ordered fields of a stage report
#[derive(Debug, Clone, Copy)]
pub struct ReportTemplate {
    pub title: &'static str,
    /// `(field name, placeholder)` in report order
    pub fields: &'static [(&'static str, &'static str)],
}

impl ReportTemplate {
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    /// Skeleton shown to a reasoner as the expected output
    pub fn expected_output(&self) -> String {
        let body = self
            .fields
            .iter()
            .map(|(name, placeholder)| format!("{}:\n{}", name, placeholder))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("{}:\n\n{}", self.title, body)
    }

    /// Fill the template. Fields missing from `values` read "Not available".
    pub fn render(&self, values: &[(&str, Vec<String>)]) -> String {
        let body = self
            .fields
            .iter()
            .map(|(name, _)| {
                let lines = values
                    .iter()
                    .find(|(field, _)| field == name)
                    .map(|(_, lines)| lines.as_slice())
                    .filter(|lines| !lines.is_empty())
                    .map(|lines| {
                        lines
                            .iter()
                            .map(|line| format!("- {}", line))
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .unwrap_or_else(|| "- Not available".to_string());
                format!("{}:\n{}", name, lines)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("{}:\n\n{}", self.title, body)
    }
}

/// Report content without its title and field labels
pub fn report_body(report: &str) -> String {
    report
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.starts_with("- ") || !line.ends_with(':'))
        .collect::<Vec<_>>()
        .join("\n")
}

const VERIFICATION_TEMPLATE: ReportTemplate = ReportTemplate {
    title: "Document Verification Report",
    fields: &[
        ("Company Name", "- Name of the reporting company"),
        ("Document Type", "- Earnings release / quarterly report / annual report / other"),
        ("Reporting Period", "- Period covered"),
        ("Key Financial Sections", "- Main financial topics covered"),
        ("Summary", "- One paragraph summary"),
    ],
};

const FINANCIAL_ANALYSIS_TEMPLATE: ReportTemplate = ReportTemplate {
    title: "Financial Analysis Report",
    fields: &[
        ("Revenue Analysis", "- Explanation"),
        ("Profitability Analysis", "- Explanation"),
        ("Cash Flow Analysis", "- Explanation"),
        ("Debt Analysis", "- Explanation"),
        ("Growth Trends", "- Explanation"),
        ("Financial Strength", "- Strong / Moderate / Weak"),
        (
            "Key Insights",
            "- Insight 1\n- Insight 2\n- Insight 3\n- Insight 4\n- Insight 5",
        ),
    ],
};

const INVESTMENT_TEMPLATE: ReportTemplate = ReportTemplate {
    title: "Investment Recommendation Report",
    fields: &[
        ("Growth Outlook", "- Explanation"),
        ("Risk Level", "- Low / Medium / High"),
        ("Investor Suitability", "- Conservative / Moderate / Aggressive"),
        ("Final Recommendation", "- Buy / Hold / Caution\n- Explanation"),
    ],
};

const RISK_TEMPLATE: ReportTemplate = ReportTemplate {
    title: "Risk Assessment Report",
    fields: &[
        ("Liquidity Risk", "- Explanation based on cash flow and liquidity"),
        ("Debt Risk", "- Explanation based on debt and liabilities"),
        ("Operational Risk", "- Explanation based on operations and production"),
        ("Market Risk", "- Explanation based on revenue trends and competition"),
        ("Overall Risk Level", "- Low / Medium / High"),
        ("Summary", "- Final professional risk summary"),
    ],
};

/// Static description of one stage
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub id: StageId,
    pub role: &'static str,
    pub goal: &'static str,
    /// Task text; `{file_path}` and `{query}` are substituted per run
    pub task: &'static str,
    pub template: ReportTemplate,
    /// Tool whitelist
    pub tools: &'static [ToolKind],
    /// Stages whose outputs this stage receives
    pub upstream: &'static [StageId],
    pub max_iterations: u32,
    pub timeout: Duration,
}

impl StageSpec {
    /// The four-stage roster with budgets from configuration
    pub fn roster(config: &StagesConfig) -> Vec<StageSpec> {
        StageId::ALL
            .into_iter()
            .map(|id| Self::for_stage(id, config))
            .collect()
    }

    pub fn for_stage(id: StageId, config: &StagesConfig) -> StageSpec {
        let limits = config.limits_for(id);
        let max_iterations = limits.max_iterations;
        let timeout = Duration::from_secs(limits.timeout_secs);

        match id {
            StageId::Verification => StageSpec {
                id,
                role: "Financial Document Verifier",
                goal: "Assess whether the uploaded document is a financial report such as an \
                       earnings release, quarterly report, annual report, or investor update. \
                       Summarize its type, reporting period, and primary financial topics.",
                task: "Use read_data_tool with file_path='{file_path}'.\n\n\
                       Rules:\n\
                       - Never copy or repeat document text\n\
                       - Only summarize and classify\n\
                       - Output the structured report only\n\n\
                       Answer the query: '{query}'",
                template: VERIFICATION_TEMPLATE,
                tools: &[ToolKind::ReadDocument],
                upstream: &[],
                max_iterations,
                timeout,
            },
            StageId::FinancialAnalysis => StageSpec {
                id,
                role: "Senior Financial Analyst",
                goal: "Extract key financial metrics such as revenue, net income, operating \
                       margins, cash flow, debt levels, and growth trends, and give structured \
                       insights based strictly on the document.",
                task: "Step 1: Use read_data_tool with file_path='{file_path}'.\n\n\
                       Step 2: Analyze revenue, net income, profit margins, cash flow, debt, \
                       and growth trends from the extracted data. Do not return raw document \
                       text.\n\n\
                       Step 3: Answer the query '{query}'.\n\n\
                       Step 4: Produce the structured financial analysis report with exactly \
                       five key insights.",
                template: FINANCIAL_ANALYSIS_TEMPLATE,
                tools: &[ToolKind::ReadDocument],
                upstream: &[StageId::Verification],
                max_iterations,
                timeout,
            },
            StageId::InvestmentRecommendation => StageSpec {
                id,
                role: "Investment Advisor",
                goal: "Develop balanced, realistic investment considerations from the financial \
                       analysis, weighing opportunities against risks without exaggerated \
                       return expectations.",
                task: "Step 1: Review the financial analysis report. Use \
                       investment_analysis_tool on its findings if needed; never on raw \
                       document text.\n\n\
                       Step 2: Identify strengths and risks.\n\n\
                       Step 3: Produce a professional investment recommendation for the \
                       query '{query}'.",
                template: INVESTMENT_TEMPLATE,
                tools: &[ToolKind::InvestmentAnalysis],
                upstream: &[StageId::FinancialAnalysis],
                max_iterations,
                timeout,
            },
            StageId::RiskAssessment => StageSpec {
                id,
                role: "Risk Assessment Specialist",
                goal: "Identify liquidity, debt, operational, and market risks from the \
                       financial analysis and produce a final structured risk report.",
                task: "Step 1: Use risk_assessment_tool on the findings of the financial \
                       analysis report.\n\n\
                       Step 2: Analyze liquidity risk, debt risk, operational risk, and \
                       market risk.\n\n\
                       Step 3: Produce the final risk assessment report. Do not stop after \
                       the tool call and do not return raw document text.",
                template: RISK_TEMPLATE,
                tools: &[ToolKind::RiskAssessment],
                upstream: &[StageId::FinancialAnalysis],
                max_iterations,
                timeout,
            },
        }
    }

    /// Task text for one run
    pub fn task_description(&self, context: &StageContext) -> String {
        self.task
            .replace("{file_path}", &context.file_path)
            .replace("{query}", &context.query)
    }
}
