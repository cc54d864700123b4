use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;

use super::{execute_step, Step};

/// Races the wrapped step against a deadline.
///
/// On timeout the inner step's scope is cancelled and `Timeout` is
/// raised; the surrounding context is untouched.
pub struct TimeoutStep<S> {
    inner: S,
    timeout: Duration,
}

impl<S: Step> TimeoutStep<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<S: Step> Step for TimeoutStep<S> {
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let scope = ctx.child();

        tokio::select! {
            result = execute_step(&self.inner, input, &scope) => result,
            _ = tokio::time::sleep(self.timeout) => {
                scope.cancel();
                Err(HiveError::Timeout(self.timeout))
            }
            _ = ctx.cancellation().cancelled() => {
                scope.cancel();
                Err(HiveError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepExt, StepFn};

    fn slow_step(delay: Duration) -> impl Step + 'static {
        StepFn::new("slow", move |input: String, ctx: Context| async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(StepResult::new(input)),
                _ = ctx.cancellation().cancelled() => Err(HiveError::Cancelled),
            }
        })
    }

    #[tokio::test]
    async fn test_fast_step_passes_through() {
        let step = slow_step(Duration::from_millis(5)).with_timeout(Duration::from_secs(5));
        let result = step.execute("x", &Context::new("x")).await.unwrap();
        assert_eq!(result.output, "x");
    }

    #[tokio::test]
    async fn test_slow_step_times_out_without_cancelling_parent() {
        let ctx = Context::new("x");
        let step = slow_step(Duration::from_secs(30)).with_timeout(Duration::from_millis(20));

        let error = step.execute("x", &ctx).await.unwrap_err();
        assert!(matches!(error, HiveError::Timeout(d) if d == Duration::from_millis(20)));
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_wins() {
        let ctx = Context::new("x");
        let step = slow_step(Duration::from_secs(30)).with_timeout(Duration::from_secs(30));

        let token = ctx.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let error = step.execute("x", &ctx).await.unwrap_err();
        assert!(matches!(error, HiveError::Cancelled));
    }
}
