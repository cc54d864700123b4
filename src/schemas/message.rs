use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enum `MessageRole` represents the role of a conversation message.
#[derive(PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub enum MessageRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[default]
    #[serde(rename = "user")]
    User,
    #[serde(rename = "tool")]
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Struct `MemoryMessage` represents one entry of conversation history as
/// the memory and session boundaries see it.
///
/// # Usage
/// ```rust,ignore
/// let user_message = MemoryMessage::user("Hello");
/// let system_message = MemoryMessage::system("System alert");
/// let assistant_message = MemoryMessage::assistant("Agent response");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: MessageRole,
    pub content: String,
    /// Correlates tool-role messages back to the originating tool call.
    pub name: Option<String>,
    #[serde(default = "SystemTime::now")]
    pub timestamp: SystemTime,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl MemoryMessage {
    pub fn new<T: fmt::Display>(role: MessageRole, content: T) -> Self {
        MemoryMessage {
            role,
            content: content.to_string(),
            name: None,
            timestamp: SystemTime::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn user<T: fmt::Display>(content: T) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant<T: fmt::Display>(content: T) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system<T: fmt::Display>(content: T) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn tool<T: fmt::Display, S: Into<String>>(name: Option<S>, content: T) -> Self {
        MemoryMessage {
            role: MessageRole::Tool,
            content: content.to_string(),
            name: name.map(|name| name.into()),
            timestamp: SystemTime::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn messages_to_string(messages: &[MemoryMessage]) -> String {
        messages
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<String>>()
            .join("\n")
    }
}

impl PartialEq for MemoryMessage {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role && self.content == other.content && self.name == other.name
    }
}

impl Eq for MemoryMessage {}

impl std::hash::Hash for MemoryMessage {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.role.hash(state);
        self.content.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for MemoryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({}): {}", self.role, name, self.content),
            None => write!(f, "{}: {}", self.role, self.content),
        }
    }
}
