use async_trait::async_trait;

use crate::error::HiveError;
use crate::schemas::{StepResult, ToolCall, ToolResult};

/// Caller-supplied observers and guardrails for one run.
///
/// Every method has a no-op default; override what you need. Guardrail
/// failures abort the run with `GuardrailViolation`.
#[async_trait]
pub trait RunHooks: Send + Sync {
    async fn on_start(&self, _input: &str) {}

    async fn on_iteration(&self, _iteration: usize) {}

    async fn on_tool_call(&self, _call: &ToolCall) {}

    async fn on_tool_result(&self, _result: &ToolResult) {}

    async fn on_finish(&self, _result: &StepResult) {}

    /// Inspect the user input before the first model turn.
    async fn guardrail_input(&self, _input: &str) -> Result<(), HiveError> {
        Ok(())
    }

    /// Inspect the final output before it is returned.
    async fn guardrail_output(&self, _output: &str) -> Result<(), HiveError> {
        Ok(())
    }
}

/// The default hooks: observe nothing, permit everything.
pub struct NoopHooks;

#[async_trait]
impl RunHooks for NoopHooks {}
