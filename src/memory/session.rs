use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::schemas::MemoryMessage;

/// Durable conversation history owned by the caller; may outlive any
/// single run. Mutations are serialized by the implementation.
#[async_trait]
pub trait Session: Send + Sync {
    /// The most recent `limit` items (all items when `None`), in the
    /// order they were added.
    async fn get_items(&self, limit: Option<usize>) -> Vec<MemoryMessage>;

    async fn add_items(&self, items: Vec<MemoryMessage>);

    /// Remove and return the most recently added item.
    async fn pop_item(&self) -> Option<MemoryMessage>;

    async fn clear(&self);
}

/// Process-local session used by tests and short-lived callers.
#[derive(Default)]
pub struct InMemorySession {
    items: Mutex<Vec<MemoryMessage>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<InMemorySession> for Arc<dyn Session> {
    fn from(val: InMemorySession) -> Self {
        Arc::new(val)
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn get_items(&self, limit: Option<usize>) -> Vec<MemoryMessage> {
        let items = self.items.lock().await;
        match limit {
            Some(limit) => {
                let start = items.len().saturating_sub(limit);
                items[start..].to_vec()
            }
            None => items.clone(),
        }
    }

    async fn add_items(&self, mut new_items: Vec<MemoryMessage>) {
        self.items.lock().await.append(&mut new_items);
    }

    async fn pop_item(&self) -> Option<MemoryMessage> {
        self.items.lock().await.pop()
    }

    async fn clear(&self) {
        self.items.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_items_returns_chronological_tail() {
        let session = InMemorySession::new();
        session
            .add_items(vec![
                MemoryMessage::user("one"),
                MemoryMessage::assistant("two"),
                MemoryMessage::user("three"),
            ])
            .await;

        let tail = session.get_items(Some(2)).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content, "two");
        assert_eq!(tail[1].content, "three");

        let all = session.get_items(None).await;
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_pop_and_clear() {
        let session = InMemorySession::new();
        session.add_items(vec![MemoryMessage::user("only")]).await;

        let popped = session.pop_item().await.unwrap();
        assert_eq!(popped.content, "only");
        assert!(session.pop_item().await.is_none());

        session.add_items(vec![MemoryMessage::user("x")]).await;
        session.clear().await;
        assert!(session.get_items(None).await.is_empty());
    }
}
