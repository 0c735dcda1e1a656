//! Keyword-rule engine shared by the investment and risk tools

use crate::extraction::md5_hex;

/// One detection predicate: any keyword present adds the insight
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub any_of: &'static [&'static str],
    pub insight: &'static str,
}

impl KeywordRule {
    fn matches(&self, lowered: &str) -> bool {
        self.any_of.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Full rule table for one analysis tool
#[derive(Debug, Clone, Copy)]
pub struct InsightRules {
    /// Report heading, e.g. `Investment Insight`
    pub header: &'static str,
    /// Line returned for empty input
    pub no_data: &'static str,
    /// Domain-relevance keywords; none present means the input is not analyzed
    pub gate: &'static [&'static str],
    /// Line returned when the gate fails
    pub insufficient: &'static str,
    /// Predicates in report order
    pub rules: &'static [KeywordRule],
    /// Line returned when no predicate matches
    pub fallback: &'static str,
}

impl InsightRules {
    /// Insight strings for the input, in rule order
    pub fn detect(&self, data: &str) -> Vec<&'static str> {
        let lowered = data.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.matches(&lowered))
            .map(|rule| rule.insight)
            .collect()
    }

    /// Whether the input carries any domain-relevance signal
    pub fn passes_gate(&self, data: &str) -> bool {
        let lowered = data.to_lowercase();
        self.gate.iter().any(|keyword| lowered.contains(keyword))
    }

    /// Render the line-prefixed report
    pub fn analyze(&self, data: &str, checksum_window: usize) -> String {
        if data.is_empty() {
            return format!("{}:\n- {}", self.header, self.no_data);
        }
        if !self.passes_gate(data) {
            return format!("{}:\n- {}", self.header, self.insufficient);
        }

        let lowered = data.to_lowercase();
        let mut insights = self.detect(&lowered);
        if insights.is_empty() {
            insights.push(self.fallback);
        }

        let window: String = lowered.chars().take(checksum_window).collect();
        let bullets = insights
            .iter()
            .map(|insight| format!("- {}", insight))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}:\n{}\nCHECKSUM:{}", self.header, bullets, md5_hex(&window))
    }
}

/// A tool report read back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightReport {
    pub header: String,
    pub items: Vec<String>,
    pub checksum: Option<String>,
}

impl InsightReport {
    pub fn parse(output: &str) -> Option<Self> {
        let mut lines = output.lines();
        let header = lines.next()?.trim().strip_suffix(':')?.to_string();

        let mut items = Vec::new();
        let mut checksum = None;
        for line in lines {
            let line = line.trim();
            if let Some(item) = line.strip_prefix("- ") {
                items.push(item.to_string());
            } else if let Some(sum) = line.strip_prefix("CHECKSUM:") {
                checksum = Some(sum.to_string());
            }
        }

        Some(Self {
            header,
            items,
            checksum,
        })
    }

    pub fn contains(&self, insight: &str) -> bool {
        self.items.iter().any(|item| item == insight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: InsightRules = InsightRules {
        header: "Test Overview",
        no_data: "Nothing given",
        gate: &["alpha", "beta"],
        insufficient: "Insufficient test indicators",
        rules: &[
            KeywordRule { any_of: &["beta"], insight: "Beta found" },
            KeywordRule { any_of: &["alpha", "gamma"], insight: "Alpha or gamma found" },
        ],
        fallback: "Nothing notable",
    };

    #[test]
    fn test_rule_order_not_input_order() {
        let out = RULES.analyze("ALPHA then beta", 3000);
        let report = InsightReport::parse(&out).unwrap();
        assert_eq!(report.header, "Test Overview");
        assert_eq!(report.items, vec!["Beta found", "Alpha or gamma found"]);
        assert_eq!(report.checksum.as_deref(), Some(md5_hex("alpha then beta").as_str()));
    }

    #[test]
    fn test_gate_and_fallback() {
        assert_eq!(RULES.analyze("", 3000), "Test Overview:\n- Nothing given");
        // Whitespace is data; it just fails the gate
        assert_eq!(
            RULES.analyze(" \n\t", 3000),
            "Test Overview:\n- Insufficient test indicators"
        );
        assert_eq!(
            RULES.analyze("unrelated words", 3000),
            "Test Overview:\n- Insufficient test indicators"
        );

        let gated_only = InsightRules {
            gate: &["delta"],
            ..RULES
        };
        let report = InsightReport::parse(&gated_only.analyze("delta", 3000)).unwrap();
        assert_eq!(report.items, vec!["Nothing notable"]);
    }

    #[test]
    fn test_checksum_covers_window_only() {
        let long = format!("alpha {}", "z".repeat(5000));
        let a = InsightReport::parse(&RULES.analyze(&long, 10)).unwrap();
        let b = InsightReport::parse(&RULES.analyze(&format!("{}tail", long), 10)).unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.checksum.unwrap(), md5_hex("alpha zzzz"));
    }
}
