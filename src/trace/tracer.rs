use std::collections::HashMap;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::HiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    AgentStart,
    AgentComplete,
    ToolCall,
    ToolResult,
    Thought,
    Custom,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub retryable: bool,
}

impl From<&HiveError> for ErrorInfo {
    fn from(error: &HiveError) -> Self {
        Self {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// A structured record handed to every [`Tracer`], independent of the
/// public event stream and its consumers.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub name: String,
    pub kind: TraceEventKind,
    pub level: TraceLevel,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub timestamp: SystemTime,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl TraceEvent {
    pub fn new(name: impl Into<String>, kind: TraceEventKind) -> Self {
        Self {
            name: name.into(),
            kind,
            level: TraceLevel::Info,
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            timestamp: SystemTime::now(),
            metadata: HashMap::new(),
            error: None,
        }
    }

    pub fn with_level(mut self, level: TraceLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_parent_span(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: &HiveError) -> Self {
        self.level = TraceLevel::Error;
        self.error = Some(ErrorInfo::from(error));
        self
    }
}

/// A sink for [`TraceEvent`]s.
///
/// `record` must be cheap and non-blocking; buffering sinks move the work
/// to `flush`.
pub trait Tracer: Send + Sync {
    fn record(&self, event: TraceEvent);

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(TraceLevel::Debug < TraceLevel::Info);
        assert!(TraceLevel::Warn < TraceLevel::Error);
    }

    #[test]
    fn test_with_error_raises_level() {
        let event = TraceEvent::new("model_turn", TraceEventKind::Custom)
            .with_error(&HiveError::GenerationFailed("boom".into()));
        assert_eq!(event.level, TraceLevel::Error);
        assert!(event.error.unwrap().retryable);
    }
}
