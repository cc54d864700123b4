use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::resilience::RetryPolicy;
use crate::schemas::StepResult;

use super::{LoggedStep, NamedStep, RetryStep, TimeoutStep};

/// The uniform unit-of-work contract: string in, [`StepResult`] out,
/// failable and cancellable through the context.
///
/// Every workflow combinator, agent and modifier is a `Step`; modifiers
/// compose by wrapping, treating the inner step as a black box.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> String {
        "step".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError>;
}

impl<S> From<S> for Arc<dyn Step>
where
    S: Step + 'static,
{
    fn from(step: S) -> Self {
        Arc::new(step)
    }
}

type StepFuture = Pin<Box<dyn Future<Output = Result<StepResult, HiveError>> + Send>>;

/// Adapts an async closure into a [`Step`].
pub struct StepFn<F> {
    name: String,
    func: F,
}

impl<F, Fut> StepFn<F>
where
    F: Fn(String, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepResult, HiveError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl StepFn<()> {
    /// A step from a plain string transform, for glue and tests.
    pub fn transform<T>(
        name: impl Into<String>,
        transform: T,
    ) -> StepFn<impl Fn(String, Context) -> StepFuture + Send + Sync>
    where
        T: Fn(&str) -> String + Send + Sync + Clone + 'static,
    {
        StepFn::new(name, move |input: String, _ctx: Context| {
            let transform = transform.clone();
            let future: StepFuture =
                Box::pin(async move { Ok(StepResult::new(transform(&input))) });
            future
        })
    }
}

#[async_trait]
impl<F, Fut> Step for StepFn<F>
where
    F: Fn(String, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StepResult, HiveError>> + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        (self.func)(input.to_string(), ctx.clone()).await
    }
}

/// Fluent modifier constructors available on every sized step.
pub trait StepExt: Step + Sized + 'static {
    fn with_retry(self, policy: RetryPolicy) -> RetryStep<Self> {
        RetryStep::new(self, policy)
    }

    fn with_timeout(self, timeout: Duration) -> TimeoutStep<Self> {
        TimeoutStep::new(self, timeout)
    }

    fn named(self, name: impl Into<String>) -> NamedStep<Self> {
        NamedStep::new(self, name)
    }

    fn logged(self) -> LoggedStep<Self> {
        let label = self.name();
        LoggedStep::new(self, label)
    }

    fn logged_as(self, label: impl Into<String>) -> LoggedStep<Self> {
        LoggedStep::new(self, label)
    }
}

impl<S: Step + Sized + 'static> StepExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_step_fn_transform() {
        let step = StepFn::transform("upper", |input| input.to_uppercase());
        let result = step
            .execute("hello", &Context::new("hello"))
            .await
            .unwrap();
        assert_eq!(result.output, "HELLO");
        assert_eq!(step.name(), "upper");
    }

    #[tokio::test]
    async fn test_step_fn_async_closure() {
        let step = StepFn::new("echo", |input: String, _ctx: Context| async move {
            Ok(StepResult::new(input))
        });
        let result = step.execute("same", &Context::new("same")).await.unwrap();
        assert_eq!(result.output, "same");
    }
}
