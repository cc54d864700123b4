use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use indoc::formatdoc;

use crate::context::Context;
use crate::error::HiveError;
use crate::provider::Provider;
use crate::schemas::{InferenceOptions, MemoryMessage, Prompt, StepResult};
use crate::step::{execute_step, Step};
use crate::trace::{TraceEvent, TraceEventKind};

/// A routable member of a supervisor: a step plus the description and
/// capabilities the routing strategies score against.
pub struct SupervisedAgent {
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub step: Arc<dyn Step>,
}

impl SupervisedAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        step: impl Into<Arc<dyn Step>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
            step: step.into(),
        }
    }

    pub fn with_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    fn haystack(&self) -> String {
        let mut haystack = format!("{} {}", self.name, self.description);
        for capability in &self.capabilities {
            haystack.push(' ');
            haystack.push_str(capability);
        }
        haystack.to_lowercase()
    }
}

/// How a supervisor picks the agent for an input.
pub enum RoutingStrategy {
    /// Score agents by keyword overlap with the input; reject matches
    /// under `min_confidence` (fraction of input words matched).
    Keyword { min_confidence: f64 },
    /// Ask the provider to name the best agent; fall back to keyword
    /// scoring when the reply names no known agent.
    Llm { provider: Arc<dyn Provider> },
}

impl RoutingStrategy {
    pub fn keyword() -> Self {
        RoutingStrategy::Keyword {
            min_confidence: 0.1,
        }
    }

    pub fn llm(provider: impl Into<Arc<dyn Provider>>) -> Self {
        RoutingStrategy::Llm {
            provider: provider.into(),
        }
    }
}

struct Selection {
    index: usize,
    confidence: f64,
    reason: String,
}

/// Routes each input to one named agent and hands control off to it.
///
/// The chosen agent's tool calls and results are copied into the
/// supervisor's result verbatim, with `routing.selected_agent` and
/// `routing.confidence` added. A configured fallback step absorbs both
/// routing misses and chosen-agent failures.
pub struct SupervisorStep {
    agents: Vec<SupervisedAgent>,
    strategy: RoutingStrategy,
    fallback: Option<Arc<dyn Step>>,
}

impl SupervisorStep {
    pub fn new(agents: Vec<SupervisedAgent>, strategy: RoutingStrategy) -> Self {
        Self {
            agents,
            strategy,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<Arc<dyn Step>>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    async fn select(&self, input: &str) -> Result<Selection, HiveError> {
        match &self.strategy {
            RoutingStrategy::Keyword { min_confidence } => {
                self.keyword_select(input, *min_confidence)
            }
            RoutingStrategy::Llm { provider } => match self.llm_select(input, provider).await {
                Ok(selection) => Ok(selection),
                Err(error) => {
                    log::warn!("LLM routing failed ({error}), falling back to keyword scoring");
                    self.keyword_select(input, 0.0)
                }
            },
        }
    }

    fn keyword_select(&self, input: &str, min_confidence: f64) -> Result<Selection, HiveError> {
        let words: BTreeSet<String> = input
            .to_lowercase()
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|word| !word.is_empty())
            .collect();

        if words.is_empty() {
            return Err(HiveError::NoRouteMatched);
        }

        let mut best: Option<Selection> = None;
        for (index, agent) in self.agents.iter().enumerate() {
            let haystack = agent.haystack();
            let matched = words
                .iter()
                .filter(|word| haystack.contains(word.as_str()))
                .count();
            let confidence = matched as f64 / words.len() as f64;

            // Strictly-greater keeps the earliest agent on ties.
            if best.as_ref().map_or(true, |b| confidence > b.confidence) {
                best = Some(Selection {
                    index,
                    confidence,
                    reason: format!("keyword overlap {matched}/{}", words.len()),
                });
            }
        }

        match best {
            Some(selection) if selection.confidence >= min_confidence => Ok(selection),
            _ => Err(HiveError::NoRouteMatched),
        }
    }

    async fn llm_select(
        &self,
        input: &str,
        provider: &Arc<dyn Provider>,
    ) -> Result<Selection, HiveError> {
        let roster = self
            .agents
            .iter()
            .map(|agent| format!("- {}: {}", agent.name, agent.description))
            .collect::<Vec<_>>()
            .join("\n");

        let question = formatdoc! {"
            Pick the best agent for the request below. Respond with only the agent name.

            Agents:
            {roster}

            Request: {input}"};

        let prompt = Prompt::new(None, vec![MemoryMessage::user(question)]);
        let reply = provider
            .generate(&prompt, &InferenceOptions::default())
            .await?;
        let reply = reply.trim().to_lowercase();

        self.agents
            .iter()
            .position(|agent| {
                let name = agent.name.to_lowercase();
                reply == name || reply.contains(&name)
            })
            .map(|index| Selection {
                index,
                confidence: 1.0,
                reason: "selected by routing model".into(),
            })
            .ok_or_else(|| {
                HiveError::GenerationFailed(format!("routing reply named no known agent: {reply}"))
            })
    }

    async fn run_fallback(
        &self,
        input: &str,
        ctx: &Context,
        cause: HiveError,
    ) -> Result<StepResult, HiveError> {
        let Some(fallback) = &self.fallback else {
            return Err(cause);
        };

        log::warn!("Supervisor falling back after: {cause}");
        let mut result = execute_step(fallback.as_ref(), input, ctx).await?;
        result.set_metadata("routing.fallback_used", true);
        result.set_metadata("routing.fallback_cause", cause.to_string());
        Ok(result)
    }
}

#[async_trait]
impl Step for SupervisorStep {
    fn name(&self) -> String {
        "supervisor".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let selection = match self.select(input).await {
            Ok(selection) => selection,
            Err(error) => return self.run_fallback(input, ctx, error).await,
        };

        let agent = &self.agents[selection.index];
        log::debug!(
            "Supervisor handing off to '{}' ({})",
            agent.name,
            selection.reason
        );
        if let Some(tracer) = ctx.tracer() {
            tracer.record(
                TraceEvent::new("handoff", TraceEventKind::Custom)
                    .with_metadata("from", "supervisor")
                    .with_metadata("to", agent.name.as_str())
                    .with_metadata("reason", selection.reason.as_str()),
            );
        }

        match execute_step(agent.step.as_ref(), input, ctx).await {
            Ok(mut result) => {
                result.set_metadata("routing.selected_agent", agent.name.as_str());
                result.set_metadata("routing.confidence", selection.confidence);
                Ok(result)
            }
            Err(error) if error.is_control() => Err(error),
            Err(error) => self.run_fallback(input, ctx, error).await,
        }
    }
}
