use serde::Serialize;

use super::{StepResult, ToolCall, ToolResult};

/// Events emitted on the public stream while a run is in flight.
///
/// Every run terminates with exactly one of `Completed`, `Failed` or
/// `Cancelled`. Within an iteration, model-turn events precede tool-turn
/// events; `IterationStarted(n + 1)` never precedes `IterationCompleted(n)`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Started {
        input: String,
    },
    IterationStarted {
        iteration: usize,
    },
    IterationCompleted {
        iteration: usize,
    },
    Thinking {
        text: String,
    },
    OutputChunk {
        text: String,
    },
    /// A streaming fragment of a tool call's arguments, in provider
    /// emission order.
    ToolCallPartial {
        provider_call_id: Option<String>,
        tool_name: String,
        arguments_fragment: String,
        index: usize,
    },
    ToolCallStarted {
        call: ToolCall,
    },
    ToolCallCompleted {
        result: ToolResult,
    },
    ToolCallFailed {
        call: ToolCall,
        error: String,
    },
    Handoff {
        from: String,
        to: String,
        reason: String,
    },
    GuardrailFailed {
        error: String,
    },
    Completed {
        result: StepResult,
    },
    Failed {
        error: String,
    },
    Cancelled,
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Completed { .. } | Event::Failed { .. } | Event::Cancelled
        )
    }
}
