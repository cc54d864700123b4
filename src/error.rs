use std::time::Duration;

use thiserror::Error;

/// Crate-wide error type surfaced across the `Step` boundary.
///
/// Every failure a step, tool, provider or resilience primitive can raise
/// is one of these variants, so callers can classify errors without
/// downcasting.
#[derive(Error, Debug, Clone)]
pub enum HiveError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution was cancelled")]
    Cancelled,

    #[error("Maximum iterations ({iterations}) exceeded")]
    MaxIterationsExceeded {
        iterations: usize,
        partial_output: String,
    },

    #[error("Step timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool '{name}' failed: {reason}")]
    ToolExecutionFailed { name: String, reason: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidToolArguments { name: String, reason: String },

    #[error("Inference provider unavailable: {0}")]
    InferenceProviderUnavailable(String),

    #[error("Rate limit exceeded{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Context length exceeded: {current} > {max}")]
    ContextLengthExceeded { current: usize, max: usize },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Guardrail violation: {0}")]
    GuardrailViolation(String),

    #[error("Workflow interrupted: {0}")]
    WorkflowInterrupted(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: usize,
        last_error: Box<HiveError>,
    },

    #[error("Circuit breaker '{0}' is open")]
    CircuitBreakerOpen(String),

    #[error("All fallbacks failed: {}", errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    AllFallbacksFailed { errors: Vec<HiveError> },

    #[error("No route matched the input")]
    NoRouteMatched,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl HiveError {
    /// Whether a retry policy should consider this error transient by
    /// default. Control-flow errors and terminal errors are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HiveError::RateLimitExceeded { .. }
                | HiveError::InferenceProviderUnavailable(_)
                | HiveError::ModelNotAvailable(_)
                | HiveError::ContextLengthExceeded { .. }
                | HiveError::CircuitBreakerOpen(_)
                | HiveError::ToolExecutionFailed { .. }
                | HiveError::GenerationFailed(_)
        )
    }

    /// Control errors abort whatever recovery machinery is in flight:
    /// retries must not swallow a cancellation or a timeout.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            HiveError::Cancelled
                | HiveError::Timeout(_)
                | HiveError::WorkflowInterrupted(_)
                | HiveError::MaxIterationsExceeded { .. }
        )
    }

    pub fn tool_execution_failed(name: impl Into<String>, reason: impl ToString) -> Self {
        HiveError::ToolExecutionFailed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_tool_arguments(name: impl Into<String>, reason: impl ToString) -> Self {
        HiveError::InvalidToolArguments {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for HiveError {
    fn from(error: serde_json::Error) -> Self {
        HiveError::InternalError(format!("JSON serialization error: {error}"))
    }
}
