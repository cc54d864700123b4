use async_trait::async_trait;

use crate::context::Context;
use crate::error::HiveError;
use crate::schemas::StepResult;

use super::Step;

/// Gives the wrapped step a name, stamped into `step.name` metadata.
pub struct NamedStep<S> {
    inner: S,
    name: String,
}

impl<S: Step> NamedStep<S> {
    pub fn new(inner: S, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }
}

#[async_trait]
impl<S: Step> Step for NamedStep<S> {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn execute(&self, input: &str, ctx: &Context) -> Result<StepResult, HiveError> {
        let mut result = self.inner.execute(input, ctx).await?;
        result.set_metadata("step.name", self.name.as_str());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::step::{StepExt, StepFn};

    #[tokio::test]
    async fn test_name_lands_in_metadata() {
        let step = StepFn::transform("id", |input| input.to_string()).named("normalizer");
        let result = step.execute("x", &Context::new("x")).await.unwrap();
        assert_eq!(result.metadata["step.name"], json!("normalizer"));
        assert_eq!(step.name(), "normalizer");
    }
}
