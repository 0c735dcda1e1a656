//! Deterministic stage reasoner
//!
//! Fills each report template from tool output alone. Document text is only
//! ever read by the verification and financial analysis stages; downstream
//! stages work on the financial analysis findings.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::roster::report_body;
use super::{StageContext, StageId, StageReasoner, StageSpec};
use crate::error::Result;
use crate::extraction::ExtractedContent;
use crate::tools::{InsightReport, StageTools, ToolKind, INVESTMENT_RULES};

const KEY_INSIGHT_COUNT: usize = 5;
const NO_FURTHER_INSIGHT: &str = "No further indicators identified";
const NEGATIVE_INSIGHT: &str = "Negative financial performance indicators";

/// Capitalized words ending in a legal-entity suffix, on one line
fn company_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b((?:[A-Z][A-Za-z0-9&'.-]*[ \t]+){0,4}[A-Z][A-Za-z0-9&'.-]*),?[ \t]+(Inc|Corp|Corporation|Ltd|Limited|LLC|PLC|plc|Company|Holdings|Group)\b\.?",
        )
        .expect("valid company regex")
    })
}

/// Legal name of the reporting entity, never the surrounding sentence
fn company_name(text: &str) -> Option<String> {
    company_name_pattern().captures_iter(text).find_map(|caps| {
        let name = caps.get(1)?.as_str().trim();
        let name = name.strip_prefix("The ").map(str::trim_start).unwrap_or(name);
        if name.is_empty() || name == "The" {
            return None;
        }
        let suffix = caps.get(2)?.as_str();
        Some(format!("{} {}", name, suffix))
    })
}

fn period_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)\bQ[1-4]\s*(?:FY\s*)?'?\d{2,4}\b").expect("valid quarter regex"),
            Regex::new(r"(?i)\b(?:first|second|third|fourth)\s+quarter(?:\s+of)?(?:\s+fiscal)?(?:\s+year)?\s+\d{4}\b")
                .expect("valid quarter name regex"),
            Regex::new(r"(?i)\b(?:fiscal(?:\s+year)?|FY)\s*\d{4}\b").expect("valid fiscal regex"),
        ]
    })
}

fn has_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lowered.contains(k))
}

/// Builds reports from tool output without a language model
#[derive(Debug, Default, Clone)]
pub struct RuleBasedReasoner;

impl RuleBasedReasoner {
    pub fn new() -> Self {
        Self
    }

    async fn read_document(
        tools: &StageTools<'_>,
        context: &StageContext,
    ) -> Result<std::result::Result<ExtractedContent, String>> {
        let output = tools
            .call(ToolKind::ReadDocument, &context.file_path)
            .await?;
        Ok(ExtractedContent::parse_payload(&output).ok_or(output))
    }

    async fn verify(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String> {
        let content = match Self::read_document(tools, context).await? {
            Ok(content) => content,
            Err(message) => {
                return Ok(spec.template.render(&[(
                    "Summary",
                    vec![format!("Verification could not proceed: {}", message)],
                )]))
            }
        };
        let lowered = content.text.to_lowercase();

        let company =
            company_name(&content.text).unwrap_or_else(|| "Not identified".to_string());

        let period = period_patterns()
            .iter()
            .find_map(|re| re.find(&content.text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "Not stated".to_string());

        let document_type = document_type(&lowered);

        let sections: Vec<&str> = [
            (&["revenue", "sales"][..], "Revenue"),
            (&["net income", "earnings per share"][..], "Earnings"),
            (&["margin"][..], "Margins"),
            (&["cash flow"][..], "Cash flow"),
            (&["debt", "liabilities"][..], "Debt and liabilities"),
            (&["guidance", "outlook"][..], "Outlook"),
        ]
        .iter()
        .filter(|(keywords, _)| has_any(&lowered, keywords))
        .map(|(_, section)| *section)
        .collect();
        let sections = if sections.is_empty() {
            "None identified".to_string()
        } else {
            sections.join(", ")
        };

        let summary = format!(
            "{} of {} page(s) reviewed for the query '{}'",
            document_type,
            content.pages,
            context.query
        );

        Ok(spec.template.render(&[
            ("Company Name", vec![company]),
            ("Document Type", vec![document_type.to_string()]),
            ("Reporting Period", vec![period]),
            ("Key Financial Sections", vec![sections]),
            ("Summary", vec![summary]),
        ]))
    }

    async fn analyze_financials(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String> {
        let content = match Self::read_document(tools, context).await? {
            Ok(content) => content,
            Err(message) => {
                return Ok(spec.template.render(&[
                    ("Financial Strength", vec!["Not assessed".to_string()]),
                    (
                        "Key Insights",
                        pad_insights(vec![format!("Analysis could not proceed: {}", message)]),
                    ),
                ]))
            }
        };
        let text = content.text.to_lowercase();

        let mut revenue = Vec::new();
        if text.contains("revenue") {
            revenue.push("Revenue figures are reported".to_string());
        }
        if has_any(&text, &["decline", "decrease"]) {
            revenue.push("Declines are reported for the period".to_string());
        }
        if revenue.is_empty() {
            revenue.push("Top-line figures are not disclosed".to_string());
        }

        let mut profitability = Vec::new();
        if text.contains("net income") {
            profitability.push("Net income results are reported".to_string());
        }
        if text.contains("operating margin") {
            profitability.push("Operating margin is reported".to_string());
        } else if text.contains("margin") {
            profitability.push("Margin data is available".to_string());
        }
        if profitability.is_empty() {
            profitability.push("Profitability figures are not disclosed".to_string());
        }

        let mut cash_flow = Vec::new();
        if text.contains("cash flow") {
            cash_flow.push("Cash flow figures are reported".to_string());
        }
        if text.contains("free cash flow") {
            cash_flow.push("Free cash flow is disclosed".to_string());
        }
        if cash_flow.is_empty() {
            cash_flow.push("Liquidity figures are not disclosed".to_string());
        }

        let debt = if has_any(&text, &["debt", "liabilities"]) {
            "Debt and liabilities are disclosed"
        } else {
            "No borrowings are disclosed"
        };

        let mut growth = Vec::new();
        if text.contains("growth") {
            growth.push("Growth is reported".to_string());
        }
        if has_any(&text, &["uncertain", "uncertainty"]) {
            growth.push("Management cites uncertainty in the outlook".to_string());
        }
        if text.contains("tariff") {
            growth.push("Tariff exposure is mentioned".to_string());
        }
        if growth.is_empty() {
            growth.push("No trend statements are disclosed".to_string());
        }

        let insights = INVESTMENT_RULES.detect(&text);
        let strength = financial_strength(&insights);
        let mut key_insights: Vec<String> = insights.iter().map(|s| s.to_string()).collect();
        if key_insights.is_empty() {
            key_insights.push(INVESTMENT_RULES.fallback.to_string());
        }

        Ok(spec.template.render(&[
            ("Revenue Analysis", revenue),
            ("Profitability Analysis", profitability),
            ("Cash Flow Analysis", cash_flow),
            ("Debt Analysis", vec![debt.to_string()]),
            ("Growth Trends", growth),
            ("Financial Strength", vec![strength.to_string()]),
            ("Key Insights", pad_insights(key_insights)),
        ]))
    }

    async fn recommend(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String> {
        let findings = findings_of(context);
        let output = tools.call(ToolKind::InvestmentAnalysis, &findings).await?;
        let report = InsightReport::parse(&output);
        let items = report.as_ref().map(|r| r.items.clone()).unwrap_or_default();
        let analyzed = report.as_ref().is_some_and(|r| r.checksum.is_some());

        let negative = items.iter().any(|i| i == NEGATIVE_INSIGHT);
        let growth = items.iter().any(|i| i == "Business growth indicators present");
        let positives = items
            .iter()
            .filter(|i| *i != NEGATIVE_INSIGHT && *i != INVESTMENT_RULES.fallback)
            .count();

        let risk_level = if !analyzed || negative {
            "High"
        } else if positives >= 3 {
            "Low"
        } else {
            "Medium"
        };
        let (suitability, recommendation) = match risk_level {
            "Low" => ("Conservative", "Buy"),
            "Medium" => ("Moderate", "Hold"),
            _ => ("Aggressive", "Caution"),
        };

        let mut outlook = Vec::new();
        if growth {
            outlook.push("Business growth indicators support a positive outlook".to_string());
        }
        if negative {
            outlook.push("Declining performance weighs on the outlook".to_string());
        }
        if outlook.is_empty() {
            outlook.push("Outlook is neutral on the available findings".to_string());
        }

        let basis = if items.is_empty() {
            "No indicators available".to_string()
        } else {
            items.join("; ")
        };

        Ok(spec.template.render(&[
            ("Growth Outlook", outlook),
            ("Risk Level", vec![risk_level.to_string()]),
            ("Investor Suitability", vec![suitability.to_string()]),
            (
                "Final Recommendation",
                vec![
                    recommendation.to_string(),
                    format!("Based on: {} (query: '{}')", basis, context.query),
                ],
            ),
        ]))
    }

    async fn assess_risk(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String> {
        let findings = findings_of(context);
        let output = tools.call(ToolKind::RiskAssessment, &findings).await?;
        let report = InsightReport::parse(&output);
        let analyzed = report.as_ref().is_some_and(|r| r.checksum.is_some());
        let items = report.map(|r| r.items).unwrap_or_default();

        let pick = |wanted: &[(&str, &str)], none: &str| -> Vec<String> {
            let found: Vec<String> = wanted
                .iter()
                .filter(|(insight, _)| items.iter().any(|i| i == insight))
                .map(|(insight, detail)| format!("{}: {}", insight, detail))
                .collect();
            if found.is_empty() {
                vec![none.to_string()]
            } else {
                found
            }
        };

        let liquidity = pick(
            &[("Cash flow fluctuation risk", "liquidity depends on reported cash flow")],
            "No liquidity concerns identified in the financial analysis",
        );
        let debt = pick(
            &[("Debt exposure risk", "debt and liabilities are disclosed")],
            "No debt exposure identified in the financial analysis",
        );
        let operational = pick(
            &[
                ("Revenue or profitability decline risk", "reported declines may persist"),
                ("Operating margin compression risk", "operating margin is under pressure"),
            ],
            "No operational concerns identified in the financial analysis",
        );
        let market = pick(
            &[
                ("Macroeconomic uncertainty risk", "outlook depends on external conditions"),
                ("Trade and tariff risk", "tariff changes may affect results"),
            ],
            "No market concerns identified in the financial analysis",
        );

        let risks: Vec<&String> = items
            .iter()
            .filter(|i| analyzed && *i != crate::tools::RISK_RULES.fallback)
            .collect();
        let overall = match risks.len() {
            _ if !analyzed => "Medium",
            0 => "Low",
            1 | 2 => "Medium",
            _ => "High",
        };
        let summary = if !analyzed {
            format!(
                "{} in the financial analysis",
                items.first().map(String::as_str).unwrap_or("No findings")
            )
        } else if risks.is_empty() {
            crate::tools::RISK_RULES.fallback.to_string()
        } else {
            format!(
                "{} risk indicator(s) identified: {}",
                risks.len(),
                risks.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("; ")
            )
        };

        Ok(spec.template.render(&[
            ("Liquidity Risk", liquidity),
            ("Debt Risk", debt),
            ("Operational Risk", operational),
            ("Market Risk", market),
            ("Overall Risk Level", vec![overall.to_string()]),
            ("Summary", vec![summary]),
        ]))
    }
}

#[async_trait]
impl StageReasoner for RuleBasedReasoner {
    async fn execute(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String> {
        match spec.id {
            StageId::Verification => self.verify(spec, context, tools).await,
            StageId::FinancialAnalysis => self.analyze_financials(spec, context, tools).await,
            StageId::InvestmentRecommendation => self.recommend(spec, context, tools).await,
            StageId::RiskAssessment => self.assess_risk(spec, context, tools).await,
        }
    }

    fn name(&self) -> &str {
        "rules"
    }
}

/// Financial analysis findings without report labels
fn findings_of(context: &StageContext) -> String {
    context
        .upstream_output(StageId::FinancialAnalysis)
        .map(report_body)
        .unwrap_or_default()
}

fn document_type(lowered: &str) -> &'static str {
    if has_any(lowered, &["10-k", "annual report"]) {
        "Annual report"
    } else if has_any(lowered, &["10-q", "quarterly", "quarter"]) {
        "Quarterly report"
    } else if has_any(lowered, &["earnings", "results"]) {
        "Earnings release"
    } else if lowered.contains("investor") {
        "Investor update"
    } else if INVESTMENT_RULES.passes_gate(lowered) {
        "Financial document"
    } else {
        "Not a recognizable financial report"
    }
}

fn financial_strength(insights: &[&str]) -> &'static str {
    let negative = insights.contains(&NEGATIVE_INSIGHT);
    let positives = insights.iter().filter(|i| **i != NEGATIVE_INSIGHT).count();

    if positives >= 4 && !negative {
        "Strong"
    } else if positives <= 1 || (negative && positives < 3) {
        "Weak"
    } else {
        "Moderate"
    }
}

fn pad_insights(mut insights: Vec<String>) -> Vec<String> {
    insights.truncate(KEY_INSIGHT_COUNT);
    while insights.len() < KEY_INSIGHT_COUNT {
        insights.push(NO_FURTHER_INSIGHT.to_string());
    }
    insights
}
