use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;
use crate::step::{execute_step, Step};

/// Tries the primary up to `retries + 1` times, then the backup.
///
/// Recovery is recorded in metadata: `fallback.used` when the backup
/// answered, `fallback.retries_before_success` when the primary needed
/// retries. Control errors (cancellation, timeout) are never absorbed.
pub struct FallbackStep {
    primary: Arc<dyn Step>,
    backup: Arc<dyn Step>,
    retries: usize,
}

impl FallbackStep {
    pub fn new(
        primary: impl Into<Arc<dyn Step>>,
        backup: impl Into<Arc<dyn Step>>,
        retries: usize,
    ) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
            retries,
        }
    }
}

#[async_trait]
impl Step for FallbackStep {
    fn name(&self) -> String {
        "fallback".into()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            match execute_step(self.primary.as_ref(), input, ctx).await {
                Ok(mut result) => {
                    result.set_metadata("fallback.used", false);
                    if attempt > 0 {
                        result.set_metadata("fallback.retries_before_success", attempt);
                    }
                    return Ok(result);
                }
                Err(error) if error.is_control() => return Err(error),
                Err(error) => {
                    log::warn!(
                        "Primary step failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.retries + 1,
                        error
                    );
                    last_error = Some(error);
                }
            }
        }

        let primary_error = last_error.expect("primary ran at least once");
        let mut result = execute_step(self.backup.as_ref(), input, ctx).await?;
        result.set_metadata("fallback.used", true);
        result.set_metadata("fallback.primary_error", primary_error.to_string());
        Ok(result)
    }
}
