use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::context::{Context, ContextKey};
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::step::{execute_step, Step};
use crate::utils::helper::duration_millis;

/// On fail-fast, the names of the children that had already completed
/// are recorded here on the run context.
pub const PARALLEL_PARTIAL: ContextKey<Vec<String>> = ContextKey::new("parallel.partial");

/// Runs every child concurrently on the same input.
///
/// Fail-fast: the first child error cancels the sibling scope and
/// propagates; completed siblings' partial results are discarded (their
/// names are left under [`PARALLEL_PARTIAL`] on the context). On
/// success, results merge in declaration order, never completion order.
pub struct ParallelStep {
    steps: Vec<Arc<dyn Step>>,
}

impl ParallelStep {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn branch(mut self, step: impl Into<Arc<dyn Step>>) -> Self {
        self.steps.push(step.into());
        self
    }
}

#[async_trait]
impl Step for ParallelStep {
    fn name(&self) -> String {
        "parallel".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let started = Instant::now();
        let scope = ctx.child();

        let mut in_flight: FuturesUnordered<_> = self
            .steps
            .iter()
            .enumerate()
            .map(|(position, step)| {
                let scope = scope.clone();
                async move { (position, execute_step(step.as_ref(), input, &scope).await) }
            })
            .collect();

        let mut slots: Vec<Option<StepResult>> = (0..self.steps.len()).map(|_| None).collect();

        while let Some((position, outcome)) = in_flight.next().await {
            match outcome {
                Ok(result) => slots[position] = Some(result),
                Err(error) => {
                    scope.cancel();
                    let completed: Vec<String> = slots
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| slot.is_some())
                        .map(|(position, _)| self.steps[position].name())
                        .collect();
                    log::warn!(
                        "Parallel branch {} failed ({}); completed branches: {:?}",
                        position + 1,
                        error,
                        completed
                    );
                    ctx.insert(&PARALLEL_PARTIAL, completed);
                    return Err(error);
                }
            }
        }
        drop(in_flight);

        let mut merged = StepResult::new("");
        let mut outputs = Vec::with_capacity(self.steps.len());
        for (position, slot) in slots.into_iter().enumerate() {
            let child = slot.expect("every parallel branch completed");
            outputs.push(format!("[{}] {}", position + 1, child.output));
            merged.absorb(&child);
            merged.merge_metadata_namespaced(&format!("parallel.step_{}", position + 1), &child);
        }

        merged.output = outputs.join("\n");
        merged.duration = started.elapsed();
        merged.set_metadata("parallel.branches", self.steps.len());
        merged.set_metadata("parallel.duration_ms", duration_millis(merged.duration));
        Ok(merged)
    }
}

/// Compose steps into a [`ParallelStep`]:
/// `parallel![fast_agent, thorough_agent]`.
#[macro_export]
macro_rules! parallel {
    ( $( $step:expr ),+ $(,)? ) => {
        $crate::workflow::ParallelStep::new(vec![
            $( ::std::sync::Arc::new($step) as ::std::sync::Arc<dyn $crate::step::Step> ),+
        ])
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::schemas::ToolCall;
    use crate::step::StepFn;

    fn tool_call_step(name: &'static str, delay: Duration) -> impl Step + 'static {
        StepFn::new(name, move |input: String, _ctx: Context| async move {
            tokio::time::sleep(delay).await;
            let mut result = StepResult::new(format!("{name}: {input}"));
            result.tool_calls.push(ToolCall::new(name, Default::default()));
            Ok(result)
        })
    }

    #[tokio::test]
    async fn test_merge_uses_declaration_order_not_completion_order() {
        // A sleeps 100ms and still comes first in the merged result.
        let step = parallel![
            tool_call_step("a", Duration::from_millis(100)),
            tool_call_step("b", Duration::ZERO),
        ];

        let result = step.execute("x", &Context::new("x")).await.unwrap();
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].name, "a");
        assert_eq!(result.tool_calls[1].name, "b");
        assert_eq!(result.output, "[1] a: x\n[2] b: x");
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_siblings_and_records_partial() {
        let ctx = Context::new("x");
        let step = parallel![
            StepFn::transform("quick", |input| format!("done {input}")),
            StepFn::new("failing", |_input: String, _ctx: Context| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(HiveError::GenerationFailed("branch failed".into()))
            }),
            StepFn::new("slow", |input: String, ctx: Context| async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(StepResult::new(input)),
                    _ = ctx.cancellation().cancelled() => Err(HiveError::Cancelled),
                }
            }),
        ];

        let started = Instant::now();
        let error = step.execute("x", &ctx).await.unwrap_err();
        assert!(matches!(error, HiveError::GenerationFailed(_)));
        assert!(started.elapsed() < Duration::from_secs(5));

        let partial = ctx.get(&PARALLEL_PARTIAL).unwrap();
        assert_eq!(partial.as_slice(), ["quick".to_string()]);
        // The sibling scope was cancelled, not the caller's context.
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_same_input_to_every_branch() {
        let step = parallel![
            StepFn::transform("left", |input| format!("L{input}")),
            StepFn::transform("right", |input| format!("R{input}")),
        ];

        let result = step.execute("x", &Context::new("x")).await.unwrap();
        assert_eq!(result.output, "[1] Lx\n[2] Rx");
    }
}
