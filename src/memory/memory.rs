use std::sync::Arc;

use tokio::sync::RwLock;

use crate::schemas::MemoryMessage;

/// Conversation memory as the agent loop sees it.
///
/// Implementations decide what to keep and what `context` returns; the
/// loop requires only that the returned string is a best-effort fit for
/// `token_limit` tokens.
pub trait Memory: Send + Sync {
    fn add_message(&mut self, message: MemoryMessage);

    fn add_messages(&mut self, messages: Vec<MemoryMessage>) {
        for message in messages {
            self.add_message(message);
        }
    }

    /// A rendered slice of history relevant to `query`, fitting within
    /// `token_limit` tokens (best effort).
    fn context(&self, query: &str, token_limit: usize) -> String;

    fn messages(&self) -> Vec<MemoryMessage>;

    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn count(&self) -> usize;
}

impl<M> From<M> for Arc<RwLock<dyn Memory>>
where
    M: Memory + 'static,
{
    fn from(memory: M) -> Self {
        Arc::new(RwLock::new(memory))
    }
}
