use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::trace::{TraceEvent, TraceEventKind};

use super::Step;

/// Announces entry and exit of the wrapped step on the tracer (or the
/// `log` facade without one) and records the exchange in metadata.
pub struct LoggedStep<S> {
    inner: S,
    label: String,
}

impl<S: Step> LoggedStep<S> {
    pub fn new(inner: S, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<S: Step> Step for LoggedStep<S> {
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        match ctx.tracer() {
            Some(tracer) => tracer.record(
                TraceEvent::new(format!("{} started", self.label), TraceEventKind::Custom)
                    .with_metadata("input", input),
            ),
            None => log::info!("[{}] started: {}", self.label, input),
        }

        let result = self.inner.execute(input, ctx).await;

        match &result {
            Ok(result) => match ctx.tracer() {
                Some(tracer) => tracer.record(
                    TraceEvent::new(format!("{} finished", self.label), TraceEventKind::Custom)
                        .with_metadata("output", result.output.as_str()),
                ),
                None => log::info!("[{}] finished: {}", self.label, result.output),
            },
            Err(error) => match ctx.tracer() {
                Some(tracer) => tracer.record(
                    TraceEvent::new(format!("{} failed", self.label), TraceEventKind::Custom)
                        .with_error(error),
                ),
                None => log::warn!("[{}] failed: {}", self.label, error),
            },
        }

        let mut result = result?;
        result.set_metadata("logging.label", self.label.as_str());
        result.set_metadata("logging.input", input);
        result.set_metadata("logging.output", result.output.clone());
        Ok(result)
    }
}
