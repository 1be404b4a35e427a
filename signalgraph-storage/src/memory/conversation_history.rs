//! ABOUTME: In-memory conversation history backend
//! ABOUTME: Keyed by main_execution_id so children can share a parent's history

use async_trait::async_trait;
use dashmap::DashMap;
use signalgraph_core::backend::ConversationHistoryBackend;
use signalgraph_core::conversation::{ConversationEntry, ConversationHistory};
use signalgraph_core::error::Result;

#[derive(Debug, Default)]
pub struct InMemoryConversationHistoryBackend {
    history: DashMap<String, ConversationHistory>,
}

impl InMemoryConversationHistoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationHistoryBackend for InMemoryConversationHistoryBackend {
    async fn get_conversation_history(&self, key: &str) -> Result<ConversationHistory> {
        Ok(self.history.get(key).map(|entry| entry.value().clone()).unwrap_or_default())
    }

    async fn append_to_conversation_history(&self, key: &str, entry: ConversationEntry) -> Result<()> {
        self.history.entry(key.to_string()).or_default().push(entry);
        Ok(())
    }

    async fn save_conversation_history(&self, key: &str, history: ConversationHistory) -> Result<()> {
        self.history.insert(key.to_string(), history);
        Ok(())
    }

    async fn delete_conversation_history(&self, key: &str) -> Result<bool> {
        Ok(self.history.remove(key).is_some())
    }

    async fn cleanup_all(&self) -> Result<()> {
        self.history.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_accumulates_turns_in_order() {
        let backend = InMemoryConversationHistoryBackend::new();
        backend.append_to_conversation_history("assistant", ConversationEntry::new("user", "hi")).await.unwrap();
        backend.append_to_conversation_history("assistant", ConversationEntry::new("assistant", "hello")).await.unwrap();
        let history = backend.get_conversation_history("assistant").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let backend = InMemoryConversationHistoryBackend::new();
        assert!(!backend.delete_conversation_history("missing").await.unwrap());
        backend.append_to_conversation_history("present", ConversationEntry::new("user", "hi")).await.unwrap();
        assert!(backend.delete_conversation_history("present").await.unwrap());
    }
}
