use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HiveError;

use super::{ToolArguments, ToolSchema};

/// A callable capability exposed to the model.
///
/// Implementations publish a [`ToolSchema`], may gate themselves off at
/// runtime via `is_enabled`, and produce a dynamic value on success.
/// Errors other than the argument/cancellation taxonomy are wrapped by
/// the registry as `ToolExecutionFailed`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Disabled tools are invisible: not listed, not callable.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn call(&self, args: ToolArguments) -> Result<Value, HiveError>;
}

impl<T> From<T> for Arc<dyn Tool>
where
    T: Tool + 'static,
{
    fn from(tool: T) -> Self {
        Arc::new(tool)
    }
}
