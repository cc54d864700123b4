use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::step::{execute_step, Step};
use crate::utils::helper::duration_millis;

/// Runs children in order, feeding each step's output into the next.
///
/// Short-circuits on the first error (no rollback). Child metadata is
/// namespaced under `sequential.step_k.*` (1-based).
pub struct SequentialStep {
    steps: Vec<Arc<dyn Step>>,
}

impl SequentialStep {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then(mut self, step: impl Into<Arc<dyn Step>>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl Step for SequentialStep {
    fn name(&self) -> String {
        "sequential".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let started = Instant::now();
        let mut merged = StepResult::new(input);
        let mut current = input.to_string();

        for (position, step) in self.steps.iter().enumerate() {
            let child = execute_step(step.as_ref(), &current, ctx).await?;

            merged.absorb(&child);
            merged.merge_metadata_namespaced(&format!("sequential.step_{}", position + 1), &child);
            current = child.output;
        }

        merged.output = current;
        merged.duration = started.elapsed();
        merged.set_metadata("sequential.steps", self.steps.len());
        merged.set_metadata("sequential.duration_ms", duration_millis(merged.duration));
        Ok(merged)
    }
}

/// Compose steps into a [`SequentialStep`]:
/// `sequential![normalize, agent, summarize]`.
#[macro_export]
macro_rules! sequential {
    () => {
        $crate::workflow::SequentialStep::empty()
    };
    ( $( $step:expr ),+ $(,)? ) => {
        $crate::workflow::SequentialStep::new(vec![
            $( ::std::sync::Arc::new($step) as ::std::sync::Arc<dyn $crate::step::Step> ),+
        ])
    };
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::step::StepFn;

    #[tokio::test]
    async fn test_output_feeds_forward() {
        let chain = sequential![
            StepFn::transform("exclaim", |input| format!("{input}!")),
            StepFn::transform("upper", |input| input.to_uppercase()),
        ];

        let result = chain.execute("hi", &Context::new("hi")).await.unwrap();
        assert_eq!(result.output, "HI!");
        assert_eq!(result.metadata["sequential.steps"], json!(2));
    }

    #[tokio::test]
    async fn test_empty_sequential_is_identity() {
        let chain = sequential![];
        let result = chain.execute("same", &Context::new("same")).await.unwrap();
        assert_eq!(result.output, "same");
        assert!(result.tool_calls.is_empty());
        assert!(result.tool_results.is_empty());
    }

    #[tokio::test]
    async fn test_short_circuit_on_error() {
        let chain = sequential![
            StepFn::new("boom", |_input: String, _ctx: Context| async {
                Err(HiveError::GenerationFailed("boom".into()))
            }),
            StepFn::transform("never", |input| input.to_string()),
        ];

        let error = chain.execute("x", &Context::new("x")).await.unwrap_err();
        assert!(matches!(error, HiveError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_child_metadata_is_namespaced() {
        let chain = sequential![StepFn::new(
            "annotated",
            |input: String, _ctx: Context| async move {
                Ok(StepResult::new(input).with_metadata("note", "from child"))
            }
        )];

        let result = chain.execute("x", &Context::new("x")).await.unwrap();
        assert_eq!(
            result.metadata["sequential.step_1.note"],
            json!("from child")
        );
    }

    #[tokio::test]
    async fn test_iterations_are_summed() {
        let chain = sequential![
            StepFn::new("two_iters", |input: String, _ctx: Context| async move {
                let mut result = StepResult::new(input);
                result.iterations = 2;
                Ok(result)
            }),
            StepFn::new("three_iters", |input: String, _ctx: Context| async move {
                let mut result = StepResult::new(input);
                result.iterations = 3;
                Ok(result)
            }),
        ];

        let result = chain.execute("x", &Context::new("x")).await.unwrap();
        assert_eq!(result.iterations, 5);
    }
}
