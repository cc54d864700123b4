use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde_json::{Map, Value};

use crate::error::HiveError;
use crate::schemas::{ToolCall, ToolResult};
use crate::utils::helper::normalize_tool_name;

use super::{Tool, ToolArguments, ToolSchema};

/// Name → tool map with stable iteration order.
///
/// Lookups are by normalized name. Disabled tools are invisible to both
/// lookup and listing.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Registering a name twice replaces the tool in place, keeping its
    /// original position in the listing order.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = normalize_tool_name(&tool.schema().name);
        match self.index.get(&name) {
            Some(&position) => self.tools[position] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of the enabled tools, in registration (insertion) order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|tool| tool.is_enabled())
            .map(|tool| tool.schema())
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, HiveError> {
        let normalized = normalize_tool_name(name);
        self.index
            .get(&normalized)
            .map(|&position| Arc::clone(&self.tools[position]))
            .filter(|tool| tool.is_enabled())
            .ok_or(HiveError::ToolNotFound(normalized))
    }

    /// Validate `args` against the tool's schema and run it. Tool-raised
    /// errors outside the argument/control taxonomy are wrapped as
    /// `ToolExecutionFailed`.
    pub async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Value, HiveError> {
        let tool = self.get(name)?;
        let schema = tool.schema();

        let filled = schema
            .validate_and_fill(args)
            .map_err(|reason| HiveError::invalid_tool_arguments(&schema.name, reason))?;

        tool.call(ToolArguments::new(&schema.name, filled))
            .await
            .map_err(|error| match error {
                HiveError::InvalidToolArguments { .. }
                | HiveError::ToolExecutionFailed { .. }
                | HiveError::Cancelled
                | HiveError::GuardrailViolation(_) => error,
                other => HiveError::tool_execution_failed(&schema.name, other),
            })
    }

    /// Run one call, folding any error into a failed [`ToolResult`].
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        match self.execute(&call.name, call.arguments.clone()).await {
            Ok(value) => ToolResult::success(&call.id, value, started.elapsed()),
            Err(error) => ToolResult::failure(&call.id, error.to_string(), started.elapsed()),
        }
    }

    /// Run every call, returning results in the order the calls were
    /// given regardless of completion order. Parallel dispatch runs on a
    /// bounded pool of `min(calls, cpus × 4)`.
    pub async fn dispatch_all(&self, calls: &[ToolCall], parallel: bool) -> Vec<ToolResult> {
        if !parallel || calls.len() <= 1 {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.dispatch(call).await);
            }
            return results;
        }

        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let limit = calls.len().min(cpus * 4);

        let futures: Vec<_> = calls
            .iter()
            .map(|call| {
                Box::pin(self.dispatch(call)) as std::pin::Pin<Box<dyn Future<Output = ToolResult> + Send + '_>>
            })
            .collect();

        futures::stream::iter(futures).buffered(limit).collect().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::tools::{FunctionTool, ToolParameter};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn calculator() -> Arc<dyn Tool> {
        Arc::new(FunctionTool::new(
            ToolSchema::new("calculator", "Evaluate an arithmetic expression")
                .parameter(ToolParameter::string("expression")),
            |args| async move {
                let expression = args.require_str("expression")?.to_string();
                match expression.as_str() {
                    "2+2" => Ok(json!("4")),
                    _ => Err(HiveError::tool_execution_failed(
                        "calculator",
                        "unsupported expression",
                    )),
                }
            },
        ))
    }

    fn sleeper(name: &str, delay: Duration) -> Arc<dyn Tool> {
        let name = name.to_string();
        Arc::new(FunctionTool::new(
            ToolSchema::new(name.clone(), "Sleep then answer"),
            move |_args| {
                let name = name.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    Ok(Value::from(name))
                }
            },
        ))
    }

    #[tokio::test]
    async fn test_execute_validates_arguments() {
        let registry = ToolRegistry::from_tools([calculator()]);

        let value = registry
            .execute("calculator", object(json!({"expression": "2+2"})))
            .await
            .unwrap();
        assert_eq!(value, json!("4"));

        let error = registry
            .execute("calculator", object(json!({"expression": 7})))
            .await
            .unwrap_err();
        assert!(matches!(error, HiveError::InvalidToolArguments { .. }));
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_tools_are_invisible() {
        let disabled = Arc::new(
            FunctionTool::new(ToolSchema::new("hidden", "Disabled"), |_args| async {
                Ok(Value::Null)
            })
            .disabled(),
        );
        let registry = ToolRegistry::from_tools([calculator(), disabled as Arc<dyn Tool>]);

        assert!(matches!(
            registry.execute("missing", Map::new()).await.unwrap_err(),
            HiveError::ToolNotFound(_)
        ));
        assert!(matches!(
            registry.execute("hidden", Map::new()).await.unwrap_err(),
            HiveError::ToolNotFound(_)
        ));

        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "calculator");
    }

    #[tokio::test]
    async fn test_lookup_normalizes_names() {
        let registry = ToolRegistry::from_tools([calculator()]);
        assert!(registry.get("Calculator ").is_ok());
    }

    #[tokio::test]
    async fn test_parallel_dispatch_preserves_call_order() {
        let registry = ToolRegistry::from_tools([
            sleeper("slow", Duration::from_millis(80)),
            sleeper("fast", Duration::from_millis(1)),
        ]);

        let calls = vec![
            ToolCall::new("slow", Map::new()),
            ToolCall::new("fast", Map::new()),
        ];
        let results = registry.dispatch_all(&calls, true).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].call_id, calls[0].id);
        assert_eq!(results[1].call_id, calls[1].id);
        assert_eq!(results[0].content(), "slow");
        assert_eq!(results[1].content(), "fast");
    }

    #[tokio::test]
    async fn test_dispatch_folds_errors_into_results() {
        let registry = ToolRegistry::from_tools([calculator()]);
        let call = ToolCall::new("calculator", object(json!({"expression": "1/0"})));
        let result = registry.dispatch(&call).await;
        assert!(!result.is_success());
        assert!(result.content().contains("unsupported expression"));
    }
}
