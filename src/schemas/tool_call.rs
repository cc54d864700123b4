use std::fmt::{self, Display};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::utils::helper::add_indent;

/// A single tool invocation requested by the model.
///
/// `id` is stable and locally generated; `provider_call_id` carries the
/// correlation id the provider emitted, when it emitted one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_call_id: Option<String>,
    pub name: String,
    pub arguments: Map<String, Value>,
    #[serde(default = "SystemTime::now")]
    pub timestamp: SystemTime,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider_call_id: None,
            name: name.into(),
            arguments,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_provider_call_id(mut self, provider_call_id: impl Into<String>) -> Self {
        self.provider_call_id = Some(provider_call_id.into());
        self
    }

    /// Arguments as a `Value::Object`, the shape tools consume.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

impl PartialEq for ToolCall {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.arguments == other.arguments
            && self.provider_call_id == other.provider_call_id
    }
}

impl Display for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.name,
            add_indent(
                &serde_json::to_string_pretty(&self.arguments)
                    .unwrap_or_else(|_| Value::Object(self.arguments.clone()).to_string()),
                4,
                false
            )
        )
    }
}

/// The outcome of dispatching one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub outcome: ToolOutcome,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, value: impl Into<Value>, duration: Duration) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Success(value.into()),
            duration,
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        reason: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failure(reason.into()),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// The result as the text fed back to the model on the next turn.
    pub fn content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(Value::String(text)) => text.clone(),
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Failure(reason) => format!("Tool call failed: {reason}"),
        }
    }
}

impl Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ToolOutcome::Success(value) => write!(f, "ok: {value}"),
            ToolOutcome::Failure(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let a = ToolCall::new("calculator", args(json!({"expression": "2+2"})));
        let b = ToolCall::new("calculator", args(json!({"expression": "2+2"})));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_tool_call_serde_round_trip() {
        let call = ToolCall::new("search", args(json!({"query": "rust"})))
            .with_provider_call_id("call_0");
        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(call, back);
    }

    #[test]
    fn test_tool_result_content() {
        let ok = ToolResult::success("id-1", "4", Duration::from_millis(3));
        assert_eq!(ok.content(), "4");

        let ok_value = ToolResult::success("id-2", json!({"count": 3}), Duration::ZERO);
        assert_eq!(ok_value.content(), r#"{"count":3}"#);

        let failed = ToolResult::failure("id-3", "no such host", Duration::ZERO);
        assert!(failed.content().starts_with("Tool call failed"));
        assert!(!failed.is_success());
    }
}
