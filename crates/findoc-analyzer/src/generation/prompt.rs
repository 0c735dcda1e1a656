//! Prompt templates for stage reasoning

use crate::agents::{StageContext, StageSpec};

/// Prompt builder for stage agents
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the full ReAct prompt for one iteration of a stage
    pub fn stage_prompt(
        spec: &StageSpec,
        task: &str,
        context: &StageContext,
        catalogue: &[(&str, &str)],
        scratchpad: &str,
        final_turn: bool,
    ) -> String {
        let upstream = if context.upstream.is_empty() {
            String::new()
        } else {
            format!(
                "\nCONTEXT FROM EARLIER STAGES:\n{}\n",
                context.upstream_block()
            )
        };

        let instructions = if final_turn {
            "This is your last turn. Do not call any tool. Reply with:\n\
             Final Answer: <the complete report>"
                .to_string()
        } else {
            format!(
                "To use a tool, reply with exactly:\n\
                 Action: <one of [{}]>\n\
                 Action Input: <input>\n\n\
                 When you have enough information, reply with:\n\
                 Final Answer: <the complete report>",
                catalogue
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };

        format!(
            r#"You are a {role}.
GOAL: {goal}

RULES:
1. Base every statement on tool observations or the context below
2. NEVER copy raw document text into the report
3. Keep the exact section headings of the expected output

TOOLS:
{tools}
{upstream}
TASK:
{task}

EXPECTED OUTPUT:
{expected}

{instructions}

{scratchpad}"#,
            role = spec.role,
            goal = spec.goal,
            tools = Self::format_tools(catalogue),
            upstream = upstream,
            task = task,
            expected = spec.template.expected_output(),
            instructions = instructions,
            scratchpad = scratchpad,
        )
    }

    /// Format the tool catalogue for the prompt
    fn format_tools(catalogue: &[(&str, &str)]) -> String {
        if catalogue.is_empty() {
            return "(none)".to_string();
        }
        catalogue
            .iter()
            .map(|(name, description)| format!("- {}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::StageId;
    use crate::config::StagesConfig;

    #[test]
    fn test_stage_prompt_sections() {
        let spec = StageSpec::for_stage(StageId::FinancialAnalysis, &StagesConfig::default());
        let mut ctx = StageContext::new("Is it profitable?", "/data/q3.pdf");
        ctx.upstream.push((StageId::Verification, "Document Verification Report:".to_string()));
        let task = spec.task_description(&ctx);

        let prompt = PromptBuilder::stage_prompt(
            &spec,
            &task,
            &ctx,
            &[("read_data_tool", "Reads a document")],
            "",
            false,
        );

        assert!(prompt.starts_with("You are a Senior Financial Analyst."));
        assert!(prompt.contains("- read_data_tool: Reads a document"));
        assert!(prompt.contains("[Document Verification]\nDocument Verification Report:"));
        assert!(prompt.contains("Action: <one of [read_data_tool]>"));
        assert!(prompt.contains("Key Insights:"));

        let last = PromptBuilder::stage_prompt(&spec, &task, &ctx, &[], "", true);
        assert!(last.contains("This is your last turn"));
        assert!(last.contains("TOOLS:\n(none)"));
    }
}
