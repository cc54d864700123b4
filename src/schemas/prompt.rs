use std::fmt;

use serde::{Deserialize, Serialize};

use super::{MemoryMessage, MessageRole};

/// What the loop hands the provider on a model turn: system instructions
/// plus the context messages selected by the memory. The provider adapter
/// owns the actual wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prompt {
    pub system: Option<String>,
    /// Budgeted context string produced by the memory for this turn.
    pub context: Option<String>,
    pub messages: Vec<MemoryMessage>,
}

impl Prompt {
    pub fn new(system: Option<String>, messages: Vec<MemoryMessage>) -> Self {
        Self {
            system,
            context: None,
            messages,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|context| !context.is_empty());
        self
    }

    pub fn to_messages(&self) -> Vec<MemoryMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        if let Some(system) = &self.system {
            messages.push(MemoryMessage::new(MessageRole::System, system));
        }
        if let Some(context) = &self.context {
            messages.push(MemoryMessage::new(
                MessageRole::System,
                format!("Relevant context:\n{context}"),
            ));
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// The most recent user message, used by providers that take a single
    /// query string.
    pub fn latest_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            MemoryMessage::messages_to_string(&self.to_messages())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_renders_first() {
        let prompt = Prompt::new(
            Some("You are helpful".into()),
            vec![MemoryMessage::user("hi")],
        );
        let messages = prompt.to_messages();
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::User);
    }

    #[test]
    fn test_latest_user_content() {
        let prompt = Prompt::new(
            None,
            vec![
                MemoryMessage::user("first"),
                MemoryMessage::assistant("mid"),
                MemoryMessage::user("last"),
            ],
        );
        assert_eq!(prompt.latest_user_content(), Some("last"));
    }
}
