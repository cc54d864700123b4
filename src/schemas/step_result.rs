use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TokenUsage, ToolCall, ToolResult};

/// The uniform output of one step execution: the final text plus
/// everything observed along the way.
///
/// `tool_calls.len()` may exceed `tool_results.len()` only when the last
/// call failed mid-dispatch; combinators concatenating children preserve
/// that property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepResult {
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    pub iterations: usize,
    #[serde(default)]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl StepResult {
    pub fn new(output: impl Into<String>) -> Self {
        StepResult {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Fold another result into this one: tool calls/results concatenated
    /// in order, iterations and durations summed, usage merged.
    ///
    /// The child's metadata is NOT merged here; combinators do that
    /// explicitly through [`StepResult::merge_metadata_namespaced`] so
    /// every entry lands under the combinator's namespace.
    pub fn absorb(&mut self, child: &StepResult) {
        self.tool_calls.extend(child.tool_calls.iter().cloned());
        self.tool_results.extend(child.tool_results.iter().cloned());
        self.iterations += child.iterations;
        self.duration += child.duration;
        self.usage = TokenUsage::merge_options(self.usage.take(), child.usage.clone());
    }

    /// Copy `child`'s metadata entries under `<namespace>.<key>`.
    ///
    /// Collisions are last-writer-wins: a later merge into the same
    /// namespaced key silently replaces the earlier value.
    pub fn merge_metadata_namespaced(&mut self, namespace: &str, child: &StepResult) {
        for (key, value) in &child.metadata {
            self.metadata
                .insert(format!("{namespace}.{key}"), value.clone());
        }
    }
}

impl PartialEq for StepResult {
    fn eq(&self, other: &Self) -> bool {
        self.output == other.output
            && self.tool_calls == other.tool_calls
            && self.tool_results == other.tool_results
            && self.iterations == other.iterations
            && self.usage == other.usage
            && self.metadata == other.metadata
    }
}
