use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::HiveError;
use crate::memory::{Memory, WindowBufferMemory};
use crate::provider::Provider;
use crate::schemas::InferenceOptions;
use crate::tools::{Tool, ToolRegistry};
use crate::trace::Tracer;

use super::{Agent, AgentConfiguration};

/// Builder for [`Agent`]. A provider is required; everything else has a
/// default (fresh window-buffer memory, empty registry, default
/// configuration).
#[derive(Default)]
pub struct AgentBuilder {
    instructions: Option<String>,
    provider: Option<Arc<dyn Provider>>,
    tools: ToolRegistry,
    memory: Option<Arc<RwLock<dyn Memory>>>,
    configuration: AgentConfiguration,
    inference_options: InferenceOptions,
    tracer: Option<Arc<dyn Tracer>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.configuration.name = name.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<Arc<dyn Provider>>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn tool(mut self, tool: impl Into<Arc<dyn Tool>>) -> Self {
        self.tools.register(tool.into());
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        for tool in tools {
            self.tools.register(tool);
        }
        self
    }

    pub fn memory(mut self, memory: impl Into<Arc<RwLock<dyn Memory>>>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn configuration(mut self, configuration: AgentConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn inference_options(mut self, inference_options: InferenceOptions) -> Self {
        self.inference_options = inference_options;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn build(self) -> Result<Agent, HiveError> {
        let provider = self
            .provider
            .ok_or_else(|| HiveError::InvalidInput("agent requires a provider".into()))?;

        let memory = self
            .memory
            .unwrap_or_else(|| WindowBufferMemory::default().into());

        Ok(Agent::from_parts(
            self.instructions.unwrap_or_default(),
            provider,
            Arc::new(self.tools),
            memory,
            self.configuration,
            self.inference_options,
            self.tracer,
        ))
    }
}
