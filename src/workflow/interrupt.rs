use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::step::Step;

type Payload = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Unconditionally raises `WorkflowInterrupted`, carrying a reason
/// derived from the input. Placed where a workflow must stop for
/// external handling (human review, escalation).
pub struct InterruptStep {
    payload: Payload,
}

impl InterruptStep {
    pub fn new(payload: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            payload: Arc::new(payload),
        }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move |_| reason.clone())
    }
}

#[async_trait]
impl Step for InterruptStep {
    fn name(&self) -> String {
        "interrupt".into()
    }

    async fn execute(&self, input: &str, _ctx: &Context) -> Result<StepResult, HiveError> {
        Err(HiveError::WorkflowInterrupted((self.payload)(input)))
    }
}
