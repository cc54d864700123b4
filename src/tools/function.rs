use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HiveError;

use super::{Tool, ToolArguments, ToolSchema};

type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, HiveError>> + Send>>;

/// Adapts an async closure into a [`Tool`].
///
/// ```rust,ignore
/// let echo = FunctionTool::new(
///     ToolSchema::new("echo", "Echo the input")
///         .parameter(ToolParameter::string("text")),
///     |args| async move { Ok(Value::from(args.require_str("text")?)) },
/// );
/// ```
pub struct FunctionTool<F> {
    schema: ToolSchema,
    func: F,
    enabled: AtomicBool,
}

impl<F, Fut> FunctionTool<F>
where
    F: Fn(ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HiveError>> + Send + 'static,
{
    pub fn new(schema: ToolSchema, func: F) -> Self {
        Self {
            schema,
            func,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn disabled(self) -> Self {
        self.enabled.store(false, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl<F, Fut> Tool for FunctionTool<F>
where
    F: Fn(ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HiveError>> + Send + 'static,
{
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn call(&self, args: ToolArguments) -> Result<Value, HiveError> {
        let future: ToolFuture = Box::pin((self.func)(args));
        future.await
    }
}
