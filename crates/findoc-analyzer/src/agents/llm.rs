//! Language-model stage reasoner (ReAct loop)

use async_trait::async_trait;
use std::sync::Arc;

use super::{StageContext, StageReasoner, StageSpec};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::tools::StageTools;

const FINAL_ANSWER: &str = "Final Answer:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";

/// One parsed model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactStep {
    FinalAnswer(String),
    Action { tool: String, input: String },
    Invalid,
}

impl ReactStep {
    pub fn parse(response: &str) -> Self {
        if let Some(idx) = response.find(FINAL_ANSWER) {
            let answer = response[idx + FINAL_ANSWER.len()..].trim();
            if !answer.is_empty() {
                return ReactStep::FinalAnswer(answer.to_string());
            }
        }

        let (Some(action_at), Some(input_at)) =
            (response.find(ACTION), response.find(ACTION_INPUT))
        else {
            return ReactStep::Invalid;
        };

        let tool = response[action_at + ACTION.len()..]
            .lines()
            .next()
            .unwrap_or_default()
            .trim();
        let input = response[input_at + ACTION_INPUT.len()..]
            .split("Observation:")
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches(|c| c == '"' || c == '\'');

        if tool.is_empty() {
            return ReactStep::Invalid;
        }
        ReactStep::Action {
            tool: tool.to_string(),
            input: input.to_string(),
        }
    }
}

/// Runs a stage as a bounded tool-calling conversation with a model
pub struct LlmReasoner {
    provider: Arc<dyn LlmProvider>,
}

impl LlmReasoner {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl StageReasoner for LlmReasoner {
    async fn execute(
        &self,
        spec: &StageSpec,
        context: &StageContext,
        tools: &StageTools<'_>,
    ) -> Result<String> {
        let task = spec.task_description(context);
        let catalogue = tools.catalogue();
        let mut scratchpad = String::new();

        for iteration in 1..=spec.max_iterations {
            let final_turn = iteration == spec.max_iterations;
            let prompt =
                PromptBuilder::stage_prompt(spec, &task, context, &catalogue, &scratchpad, final_turn);

            tracing::debug!(
                "{} iteration {}/{} via {} ({})",
                spec.id,
                iteration,
                spec.max_iterations,
                self.provider.name(),
                self.provider.model()
            );
            let response = self.provider.generate(&prompt).await?;

            match ReactStep::parse(&response) {
                ReactStep::FinalAnswer(answer) => return Ok(answer),
                ReactStep::Action { tool, input } if !final_turn => {
                    let observation = tools.call_by_name(&tool, &input).await?;
                    scratchpad.push_str(&format!(
                        "{} {}\n{} {}\nObservation: {}\n\n",
                        ACTION, tool, ACTION_INPUT, input, observation
                    ));
                }
                ReactStep::Action { tool, .. } => {
                    tracing::warn!("{} requested {} with no iterations left", spec.id, tool);
                }
                ReactStep::Invalid => {
                    scratchpad.push_str(
                        "Observation: Invalid format. Reply with an Action and Action Input, \
                         or with a Final Answer.\n\n",
                    );
                }
            }
        }

        Err(Error::stage_failure(
            spec.id.as_str(),
            format!(
                "no final answer after {} iteration(s)",
                spec.max_iterations
            ),
        ))
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::StageId;
    use crate::config::{StagesConfig, ToolConfig};
    use crate::extraction::ContentExtractor;
    use crate::tools::{ToolBox, ToolKind};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            Ok(self.responses.lock().pop_front().unwrap_or_default())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn spec(id: StageId, max_iterations: u32) -> StageSpec {
        let mut spec = StageSpec::for_stage(id, &StagesConfig::default());
        spec.max_iterations = max_iterations;
        spec
    }

    fn toolbox() -> ToolBox {
        ToolBox::for_run(&ToolConfig::default(), ContentExtractor::default())
    }

    #[test]
    fn test_parse_steps() {
        assert_eq!(
            ReactStep::parse("Thought: done\nFinal Answer: Risk Assessment Report:"),
            ReactStep::FinalAnswer("Risk Assessment Report:".to_string())
        );
        assert_eq!(
            ReactStep::parse("Action: risk_assessment_tool\nAction Input: \"revenue fell\"\n"),
            ReactStep::Action {
                tool: "risk_assessment_tool".to_string(),
                input: "revenue fell".to_string(),
            }
        );
        assert_eq!(ReactStep::parse("I am not sure"), ReactStep::Invalid);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let llm = ScriptedLlm::new(&[
            "Action: risk_assessment_tool\nAction Input: debt rose and revenue fell",
            "Final Answer: Risk Assessment Report:\n\nDebt Risk:\n- Debt exposure",
        ]);
        let reasoner = LlmReasoner::new(llm.clone());
        let tools = toolbox();
        let spec = spec(StageId::RiskAssessment, 2);
        let ctx = StageContext::new("q", "/tmp/none.pdf");

        let out = reasoner
            .execute(&spec, &ctx, &tools.scoped(spec.id, spec.tools))
            .await
            .unwrap();

        assert!(out.starts_with("Risk Assessment Report:"));
        assert_eq!(tools.get(ToolKind::RiskAssessment).usage().used(), 1);

        let prompts = llm.prompts.lock();
        assert!(prompts[1].contains("Observation: Risk Overview:"));
    }

    #[tokio::test]
    async fn test_exhausted_iterations_fail_stage() {
        let llm = ScriptedLlm::new(&["thinking...", "still thinking..."]);
        let reasoner = LlmReasoner::new(llm);
        let tools = toolbox();
        let spec = spec(StageId::Verification, 2);
        let ctx = StageContext::new("q", "/tmp/none.pdf");

        let err = reasoner
            .execute(&spec, &ctx, &tools.scoped(spec.id, spec.tools))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StageFailure { ref stage, .. } if stage == "verification"));
    }

    #[tokio::test]
    async fn test_usage_cap_is_not_masked() {
        let call = "Action: investment_analysis_tool\nAction Input: revenue growth";
        let llm = ScriptedLlm::new(&[call, call, call, call, "Final Answer: done"]);
        let reasoner = LlmReasoner::new(llm);
        let tools = toolbox();
        let spec = spec(StageId::InvestmentRecommendation, 5);
        let ctx = StageContext::new("q", "/tmp/none.pdf");

        let err = reasoner
            .execute(&spec, &ctx, &tools.scoped(spec.id, spec.tools))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolUsageExceeded { max: 3, .. }));
    }

    #[tokio::test]
    async fn test_tool_outside_whitelist_rejected() {
        let llm = ScriptedLlm::new(&["Action: read_data_tool\nAction Input: /etc/passwd"]);
        let reasoner = LlmReasoner::new(llm);
        let tools = toolbox();
        let spec = spec(StageId::InvestmentRecommendation, 2);
        let ctx = StageContext::new("q", "/tmp/none.pdf");

        let err = reasoner
            .execute(&spec, &ctx, &tools.scoped(spec.id, spec.tools))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotPermitted { .. }));
    }
}
