use serde::{Deserialize, Serialize};

use super::{TokenUsage, ToolCall};

/// Options passed through to the provider on every model turn.
///
/// Providers contractually ignore options they do not understand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
}

impl InferenceOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Specific(String),
}

/// Why the model stopped. Unknown values decode as `Completed` so new
/// provider-side reasons never break the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Completed,
    MaxTokens,
    ToolCall,
    ContentFilter,
    Cancelled,
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "max_tokens" => FinishReason::MaxTokens,
            "tool_call" => FinishReason::ToolCall,
            "content_filter" => FinishReason::ContentFilter,
            "cancelled" => FinishReason::Cancelled,
            // "completed", "stop" and anything a future provider invents.
            _ => FinishReason::Completed,
        })
    }
}

/// A complete (non-streaming) model response.
#[derive(Debug, Clone, Default)]
pub struct InferenceResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

impl InferenceResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Completed,
            usage: None,
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: FinishReason::ToolCall,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// One update on a tool-call-aware model stream.
#[derive(Debug, Clone)]
pub enum InferenceStreamUpdate {
    OutputChunk(String),
    ToolCallPartial {
        provider_call_id: Option<String>,
        tool_name: String,
        arguments_fragment: String,
        index: usize,
    },
    ToolCallsCompleted(Vec<ToolCall>),
    Usage(TokenUsage),
    Done(FinishReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_finish_reason_is_completed() {
        let reason: FinishReason = serde_json::from_str(r#""some_new_reason""#).unwrap();
        assert_eq!(reason, FinishReason::Completed);

        let reason: FinishReason = serde_json::from_str(r#""stop""#).unwrap();
        assert_eq!(reason, FinishReason::Completed);

        let reason: FinishReason = serde_json::from_str(r#""max_tokens""#).unwrap();
        assert_eq!(reason, FinishReason::MaxTokens);
    }

    #[test]
    fn test_option_clamping() {
        let options = InferenceOptions::default()
            .with_temperature(3.5)
            .with_top_p(-0.2);
        assert_eq!(options.temperature, Some(2.0));
        assert_eq!(options.top_p, Some(0.0));
    }
}
