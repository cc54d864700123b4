use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::resilience::RetryPolicy;
use crate::schemas::StepResult;

use super::{execute_step, Step};

/// Re-runs the wrapped step per the policy. A success after retries is
/// recorded in the result metadata rather than surfaced as an error.
pub struct RetryStep<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Step> RetryStep<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: Step> Step for RetryStep<S> {
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let (mut result, attempts) = self
            .policy
            .execute_cancellable(ctx.cancellation(), || {
                execute_step(&self.inner, input, ctx)
            })
            .await?;

        result.set_metadata("retry.attempts", attempts);
        if attempts > 1 {
            result.set_metadata("retry.recovered", true);
        }
        Ok(result)
    }
}
