use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::step::{execute_step, Step};
use crate::utils::helper::duration_millis;

/// Hard cap on predicate-driven loops.
const PREDICATE_ITERATION_CAP: usize = 1000;

type Predicate = Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// When a [`LoopStep`] keeps going.
#[derive(Clone)]
pub enum LoopCondition {
    /// Run the body exactly `n` times (0 makes the loop the identity).
    MaxIterations(usize),
    /// Run, then stop once the predicate accepts the new output.
    Until(Predicate),
    /// Keep running while the predicate accepts the upcoming input.
    While(Predicate),
}

impl LoopCondition {
    pub fn max_iterations(n: usize) -> Self {
        LoopCondition::MaxIterations(n)
    }

    pub fn until<F, Fut>(predicate: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        LoopCondition::Until(Arc::new(move |output| Box::pin(predicate(output))))
    }

    pub fn until_sync(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::until(move |output: String| {
            let accepted = predicate(&output);
            async move { accepted }
        })
    }

    pub fn while_true<F, Fut>(predicate: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        LoopCondition::While(Arc::new(move |input| Box::pin(predicate(input))))
    }

    pub fn while_true_sync(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::while_true(move |input: String| {
            let accepted = predicate(&input);
            async move { accepted }
        })
    }
}

/// Repeats the body, threading each iteration's output into the next
/// iteration's input.
///
/// Predicate-driven loops stop at 1000 iterations regardless, with
/// `loop.capped` set. Predicates must be pure; the `until` form is
/// re-evaluated against each iteration's fresh output.
pub struct LoopStep {
    condition: LoopCondition,
    body: Arc<dyn Step>,
}

impl LoopStep {
    pub fn new(condition: LoopCondition, body: impl Into<Arc<dyn Step>>) -> Self {
        Self {
            condition,
            body: body.into(),
        }
    }
}

#[async_trait]
impl Step for LoopStep {
    fn name(&self) -> String {
        "loop".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let started = Instant::now();
        let mut merged = StepResult::new(input);
        let mut current = input.to_string();
        let mut iterations = 0usize;
        let mut capped = false;

        loop {
            match &self.condition {
                LoopCondition::MaxIterations(n) => {
                    if iterations >= *n {
                        break;
                    }
                }
                LoopCondition::While(predicate) => {
                    if iterations >= PREDICATE_ITERATION_CAP {
                        capped = true;
                        break;
                    }
                    if !predicate(current.clone()).await {
                        break;
                    }
                }
                LoopCondition::Until(_) => {
                    if iterations >= PREDICATE_ITERATION_CAP {
                        capped = true;
                        break;
                    }
                }
            }

            let child = execute_step(self.body.as_ref(), &current, ctx).await?;
            iterations += 1;

            merged.absorb(&child);
            merged.merge_metadata_namespaced(&format!("loop.iter_{iterations}"), &child);
            current = child.output;

            if let LoopCondition::Until(predicate) = &self.condition {
                if predicate(current.clone()).await {
                    break;
                }
            }
        }

        merged.output = current;
        merged.duration = started.elapsed();
        merged.set_metadata("loop.iteration_count", iterations);
        if capped {
            log::warn!("Loop stopped at the {PREDICATE_ITERATION_CAP}-iteration safety cap");
            merged.set_metadata("loop.capped", true);
        }
        merged.set_metadata("loop.duration_ms", duration_millis(merged.duration));
        Ok(merged)
    }
}
