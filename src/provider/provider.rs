use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::HiveError;
use crate::schemas::{InferenceOptions, InferenceResponse, InferenceStreamUpdate, Prompt};
use crate::tools::ToolSchema;

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, HiveError>> + Send>>;
pub type InferenceStream =
    Pin<Box<dyn Stream<Item = Result<InferenceStreamUpdate, HiveError>> + Send>>;

/// The model boundary the loop consumes. Adapters implement whichever
/// subset they support and advertise it through the capability probes;
/// `generate` is the only required operation.
///
/// Implementations convert into `Arc<dyn Provider>` for sharing.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str {
        "provider"
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn supports_tool_calls(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        options: &InferenceOptions,
    ) -> Result<String, HiveError>;

    async fn stream(
        &self,
        _prompt: &Prompt,
        _options: &InferenceOptions,
    ) -> Result<TextStream, HiveError> {
        Err(HiveError::GenerationFailed(format!(
            "provider '{}' does not support streaming",
            self.name()
        )))
    }

    async fn generate_with_tool_calls(
        &self,
        _prompt: &Prompt,
        _tools: &[ToolSchema],
        _options: &InferenceOptions,
    ) -> Result<InferenceResponse, HiveError> {
        Err(HiveError::GenerationFailed(format!(
            "provider '{}' does not support tool calls",
            self.name()
        )))
    }

    async fn stream_with_tool_calls(
        &self,
        _prompt: &Prompt,
        _tools: &[ToolSchema],
        _options: &InferenceOptions,
    ) -> Result<InferenceStream, HiveError> {
        Err(HiveError::GenerationFailed(format!(
            "provider '{}' does not support streaming tool calls",
            self.name()
        )))
    }
}

impl<P> From<P> for std::sync::Arc<dyn Provider>
where
    P: Provider + 'static,
{
    fn from(provider: P) -> Self {
        std::sync::Arc::new(provider)
    }
}
