use std::time::Instant;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::trace::{TraceEvent, TraceEventKind};
use crate::utils::helper::duration_millis;

use super::Step;

/// Run one step with the shared execution envelope: cancellation
/// pre-check, tracer bracketing and duration accounting.
///
/// Combinators and the agent loop route child execution through here so
/// a cancelled context never starts new work.
pub async fn execute_step(
    step: &dyn Step,
    input: &str,
    ctx: &Context,
) -> Result<StepResult, HiveError> {
    ctx.check_cancelled()?;

    let name = step.name();
    let started = Instant::now();

    if let Some(tracer) = ctx.tracer() {
        tracer.record(TraceEvent::new(name.clone(), TraceEventKind::AgentStart));
    }

    let mut outcome = step.execute(input, ctx).await;

    if let Ok(result) = &mut outcome {
        if result.duration.is_zero() {
            result.duration = started.elapsed();
        }
    }

    if let Some(tracer) = ctx.tracer() {
        let event = TraceEvent::new(name, TraceEventKind::AgentComplete)
            .with_metadata("duration_ms", duration_millis(started.elapsed()));
        let event = match &outcome {
            Ok(_) => event,
            Err(error) => event.with_error(error),
        };
        tracer.record(event);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::step::StepFn;
    use crate::trace::{MetricsCollector, Tracer};

    #[tokio::test]
    async fn test_cancelled_context_never_starts_the_step() {
        let step = StepFn::transform("id", |input| input.to_string());
        let ctx = Context::new("x");
        ctx.cancel();

        let result = execute_step(&step, "x", &ctx).await;
        assert!(matches!(result.unwrap_err(), HiveError::Cancelled));
    }

    #[tokio::test]
    async fn test_duration_is_recorded() {
        let step = StepFn::new("sleepy", |input: String, _ctx: Context| async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(StepResult::new(input))
        });
        let ctx = Context::new("x");

        let result = execute_step(&step, "x", &ctx).await.unwrap();
        assert!(result.duration >= std::time::Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tracer_sees_start_and_complete() {
        let metrics = Arc::new(MetricsCollector::new());
        let ctx = Context::builder("x")
            .tracer(metrics.clone() as Arc<dyn Tracer>)
            .build();

        let step = StepFn::transform("id", |input| input.to_string());
        execute_step(&step, "x", &ctx).await.unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.started, 1);
        assert_eq!(snapshot.succeeded, 1);
    }
}
