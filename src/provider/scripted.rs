use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;

use crate::error::HiveError;
use crate::schemas::{
    FinishReason, InferenceOptions, InferenceResponse, InferenceStreamUpdate, Prompt,
};
use crate::tools::ToolSchema;

use super::{InferenceStream, Provider, TextStream};

/// A provider that replays a fixed script of responses, one per model
/// turn. Used throughout the test suite and handy for deterministic
/// demos; never performs I/O.
///
/// In streaming mode each scripted response is replayed as a plausible
/// update sequence: output chunks, tool-call fragments, the completed
/// calls, usage, then `Done`.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Result<InferenceResponse, HiveError>>>,
    streaming: bool,
    turn_delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(turns: impl IntoIterator<Item = InferenceResponse>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().map(Ok).collect()),
            streaming: false,
            turn_delay: None,
        }
    }

    /// Script a failure for one turn.
    pub fn push_error(self, error: HiveError) -> Self {
        self.turns
            .lock()
            .expect("script poisoned")
            .push_back(Err(error));
        self
    }

    /// Advertise and serve the streaming operations.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Sleep before answering each turn, for cancellation and ordering
    /// tests.
    pub fn with_turn_delay(mut self, delay: Duration) -> Self {
        self.turn_delay = Some(delay);
        self
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().expect("script poisoned").len()
    }

    fn next_turn(&self) -> Result<InferenceResponse, HiveError> {
        self.turns
            .lock()
            .expect("script poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(HiveError::GenerationFailed(
                    "scripted provider ran out of turns".into(),
                ))
            })
    }

    async fn delay(&self) {
        if let Some(delay) = self.turn_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn supports_tool_calls(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _options: &InferenceOptions,
    ) -> Result<String, HiveError> {
        self.delay().await;
        let response = self.next_turn()?;
        response
            .content
            .ok_or_else(|| HiveError::GenerationFailed("scripted turn had no content".into()))
    }

    async fn stream(
        &self,
        prompt: &Prompt,
        options: &InferenceOptions,
    ) -> Result<TextStream, HiveError> {
        let content = self.generate(prompt, options).await?;
        Ok(Box::pin(stream! {
            // Split on whitespace to exercise chunked consumption.
            for chunk in content.split_inclusive(' ') {
                yield Ok(chunk.to_string());
            }
        }))
    }

    async fn generate_with_tool_calls(
        &self,
        _prompt: &Prompt,
        _tools: &[ToolSchema],
        _options: &InferenceOptions,
    ) -> Result<InferenceResponse, HiveError> {
        self.delay().await;
        self.next_turn()
    }

    async fn stream_with_tool_calls(
        &self,
        _prompt: &Prompt,
        _tools: &[ToolSchema],
        _options: &InferenceOptions,
    ) -> Result<InferenceStream, HiveError> {
        self.delay().await;
        let response = self.next_turn()?;

        Ok(Box::pin(stream! {
            if let Some(content) = &response.content {
                for chunk in content.split_inclusive(' ') {
                    yield Ok(InferenceStreamUpdate::OutputChunk(chunk.to_string()));
                }
            }

            if !response.tool_calls.is_empty() {
                for (index, call) in response.tool_calls.iter().enumerate() {
                    yield Ok(InferenceStreamUpdate::ToolCallPartial {
                        provider_call_id: call.provider_call_id.clone(),
                        tool_name: call.name.clone(),
                        arguments_fragment: call.arguments_value().to_string(),
                        index,
                    });
                }
                yield Ok(InferenceStreamUpdate::ToolCallsCompleted(
                    response.tool_calls.clone(),
                ));
            }

            if let Some(usage) = response.usage.clone() {
                yield Ok(InferenceStreamUpdate::Usage(usage));
            }

            let finish_reason = if response.tool_calls.is_empty() {
                response.finish_reason
            } else {
                FinishReason::ToolCall
            };
            yield Ok(InferenceStreamUpdate::Done(finish_reason));
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::schemas::ToolCall;

    #[tokio::test]
    async fn test_turns_are_consumed_in_order() {
        let provider = ScriptedProvider::new([
            InferenceResponse::text("first"),
            InferenceResponse::text("second"),
        ]);
        let prompt = Prompt::default();
        let options = InferenceOptions::default();

        assert_eq!(provider.generate(&prompt, &options).await.unwrap(), "first");
        assert_eq!(
            provider.generate(&prompt, &options).await.unwrap(),
            "second"
        );
        assert!(provider.generate(&prompt, &options).await.is_err());
    }

    #[tokio::test]
    async fn test_streaming_replays_tool_calls() {
        let args = match json!({"expression": "2+2"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let provider = ScriptedProvider::new([InferenceResponse::tool_calls(vec![
            ToolCall::new("calculator", args),
        ])])
        .streaming();

        let mut updates = provider
            .stream_with_tool_calls(&Prompt::default(), &[], &InferenceOptions::default())
            .await
            .unwrap();

        let mut saw_partial = false;
        let mut completed = Vec::new();
        let mut finish = None;
        while let Some(update) = updates.next().await {
            match update.unwrap() {
                InferenceStreamUpdate::ToolCallPartial { tool_name, .. } => {
                    assert_eq!(tool_name, "calculator");
                    saw_partial = true;
                }
                InferenceStreamUpdate::ToolCallsCompleted(calls) => completed = calls,
                InferenceStreamUpdate::Done(reason) => finish = Some(reason),
                _ => {}
            }
        }

        assert!(saw_partial);
        assert_eq!(completed.len(), 1);
        assert_eq!(finish, Some(FinishReason::ToolCall));
    }
}
