use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HiveError;

type BoxedOp<T> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<T, HiveError>> + Send>> + Send + Sync>;
type Condition = Arc<dyn Fn() -> bool + Send + Sync>;
type OnFailure = Arc<dyn Fn(&str, &HiveError) + Send + Sync>;

struct ChainStep<T> {
    name: String,
    op: BoxedOp<T>,
    condition: Option<Condition>,
    guaranteed: bool,
}

/// One failed step of a chain execution.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step_name: String,
    pub error: HiveError,
}

/// Outcome of a successful chain execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    pub output: T,
    pub step_name: String,
    pub step_index: usize,
    /// Steps actually attempted, including the successful one.
    pub total_attempts: usize,
    pub errors: Vec<StepFailure>,
}

/// An ordered list of alternatives tried until one succeeds.
///
/// Conditional steps are skipped when their condition is false. A
/// `guaranteed` step is the end of the line: if it fails, the whole
/// chain fails immediately.
pub struct FallbackChain<T> {
    steps: Vec<ChainStep<T>>,
    on_failure: Option<OnFailure>,
}

impl<T> Default for FallbackChain<T> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            on_failure: None,
        }
    }
}

impl<T> FallbackChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step<F, Fut>(self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HiveError>> + Send + 'static,
    {
        self.push(name, op, None, false)
    }

    pub fn with_conditional_step<F, Fut>(
        self,
        name: impl Into<String>,
        condition: impl Fn() -> bool + Send + Sync + 'static,
        op: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HiveError>> + Send + 'static,
    {
        self.push(name, op, Some(Arc::new(condition)), false)
    }

    /// A step that must succeed; its failure fails the chain outright.
    pub fn with_guaranteed_step<F, Fut>(self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HiveError>> + Send + 'static,
    {
        self.push(name, op, None, true)
    }

    pub fn on_failure(mut self, callback: impl Fn(&str, &HiveError) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    fn push<F, Fut>(
        mut self,
        name: impl Into<String>,
        op: F,
        condition: Option<Condition>,
        guaranteed: bool,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HiveError>> + Send + 'static,
    {
        self.steps.push(ChainStep {
            name: name.into(),
            op: Arc::new(move || Box::pin(op())),
            condition,
            guaranteed,
        });
        self
    }

    pub async fn execute(&self) -> Result<ExecutionResult<T>, HiveError> {
        let mut errors: Vec<StepFailure> = Vec::new();
        let mut attempts = 0;

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(condition) = &step.condition {
                if !condition() {
                    log::debug!("Fallback step '{}' skipped (condition false)", step.name);
                    continue;
                }
            }

            attempts += 1;
            match (step.op)().await {
                Ok(output) => {
                    return Ok(ExecutionResult {
                        output,
                        step_name: step.name.clone(),
                        step_index: index,
                        total_attempts: attempts,
                        errors,
                    });
                }
                Err(error) => {
                    log::warn!("Fallback step '{}' failed: {}", step.name, error);
                    if let Some(on_failure) = &self.on_failure {
                        on_failure(&step.name, &error);
                    }
                    errors.push(StepFailure {
                        step_name: step.name.clone(),
                        error,
                    });

                    if step.guaranteed {
                        break;
                    }
                }
            }
        }

        Err(HiveError::AllFallbacksFailed {
            errors: errors.into_iter().map(|failure| failure.error).collect(),
        })
    }
}
