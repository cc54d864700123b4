use serde_json::{Map, Value};

use crate::error::HiveError;

/// Validated arguments as a tool sees them.
///
/// Accessors fail with `InvalidToolArguments` instead of panicking; the
/// loop feeds that failure back to the model as a tool-role message.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    tool_name: String,
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(tool_name: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            values,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&Value, HiveError> {
        self.values.get(key).ok_or_else(|| {
            HiveError::invalid_tool_arguments(
                &self.tool_name,
                format!("missing required argument '{key}'"),
            )
        })
    }

    pub fn require_str(&self, key: &str) -> Result<&str, HiveError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| self.type_mismatch(key, "string"))
    }

    pub fn require_i64(&self, key: &str) -> Result<i64, HiveError> {
        self.require(key)?
            .as_i64()
            .ok_or_else(|| self.type_mismatch(key, "integer"))
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, HiveError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| self.type_mismatch(key, "number"))
    }

    pub fn require_bool(&self, key: &str) -> Result<bool, HiveError> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| self.type_mismatch(key, "boolean"))
    }

    pub fn require_array(&self, key: &str) -> Result<&Vec<Value>, HiveError> {
        self.require(key)?
            .as_array()
            .ok_or_else(|| self.type_mismatch(key, "array"))
    }

    pub fn require_object(&self, key: &str) -> Result<&Map<String, Value>, HiveError> {
        self.require(key)?
            .as_object()
            .ok_or_else(|| self.type_mismatch(key, "object"))
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, HiveError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.type_mismatch(key, "string")),
        }
    }

    pub fn optional_i64(&self, key: &str) -> Result<Option<i64>, HiveError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.type_mismatch(key, "integer")),
        }
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, HiveError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.type_mismatch(key, "boolean")),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, HiveError> {
        Ok(self
            .optional_str(key)?
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64, HiveError> {
        Ok(self.optional_i64(key)?.unwrap_or(default))
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    fn type_mismatch(&self, key: &str, expected: &str) -> HiveError {
        HiveError::invalid_tool_arguments(
            &self.tool_name,
            format!("argument '{key}' is not a {expected}"),
        )
    }
}
