use crate::schemas::MemoryMessage;

use super::Memory;

/// Rough token estimate: four characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Keeps the most recent `window_size` messages.
///
/// `context` ignores the query and selects the newest messages that fit
/// the token budget, rendered oldest-first.
pub struct WindowBufferMemory {
    window_size: usize,
    messages: Vec<MemoryMessage>,
}

impl Default for WindowBufferMemory {
    fn default() -> Self {
        Self::new(50)
    }
}

impl WindowBufferMemory {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            messages: Vec::new(),
        }
    }
}

impl Memory for WindowBufferMemory {
    fn add_message(&mut self, message: MemoryMessage) {
        if self.messages.len() >= self.window_size {
            self.messages.remove(0);
        }
        self.messages.push(message);
    }

    fn context(&self, _query: &str, token_limit: usize) -> String {
        let budget = token_limit.saturating_mul(CHARS_PER_TOKEN);

        let mut selected: Vec<&MemoryMessage> = Vec::new();
        let mut used = 0;
        for message in self.messages.iter().rev() {
            let cost = message.content.len() + message.role.to_string().len() + 2;
            if used + cost > budget {
                break;
            }
            used += cost;
            selected.push(message);
        }
        selected.reverse();

        selected
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn messages(&self) -> Vec<MemoryMessage> {
        self.messages.clone()
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    fn count(&self) -> usize {
        self.messages.len()
    }
}
