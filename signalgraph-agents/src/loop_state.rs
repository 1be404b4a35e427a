//! ABOUTME: Internal state tracked across an agent node's Router/Tool loop
//! ABOUTME: Ported from agent/lib/loop_state.py

use serde::{Deserialize, Serialize};
use serde_json::Value;
use signalgraph_core::backend::Backends;
use signalgraph_core::conversation::ConversationEntry;
use signalgraph_core::error::Result;

/// One turn recorded in the loop's own conversation trace. Distinct from
/// [`signalgraph_core::conversation::ConversationEntry`] in that it
/// carries a `tool_name` and a `role` wider than user/assistant/system
/// (`tool`, `tool_error`, `system_error`) — the agent loop's internal
/// bookkeeping, not the identity-level conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopEntry {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub content: String,
}

/// What happened most recently in the loop, used to pick the Router
/// stage's state-specific instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Initial,
    ToolResponse,
    ToolError,
    Retry,
}

/// Tracks tool responses, errors, and a running conversation trace
/// across one agent node execution's Router/Tool loop.
///
/// When `history_key` is set, every entry is also persisted to the
/// `conversation_history` backend as it's added, so the trace survives
/// across separate agent node executions that share an identity.
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    pub tool_responses: std::collections::HashMap<String, Value>,
    pub conversation_history: Vec<LoopEntry>,
    pub errors: Vec<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub history_key: Option<String>,
}

impl AgentLoopState {
    pub async fn create(history_key: Option<String>, backends: &Backends, max_retries: u32) -> Result<Self> {
        let mut conversation_history = Vec::new();

        if let (Some(key), Some(backend)) = (&history_key, &backends.conversation_history) {
            let existing = backend.get_conversation_history(key).await?;
            conversation_history = existing.into_iter().map(|e| LoopEntry { role: e.role, tool_name: None, content: e.content }).collect();
        }

        Ok(Self { tool_responses: std::collections::HashMap::new(), conversation_history, errors: Vec::new(), retry_count: 0, max_retries, history_key })
    }

    async fn persist_entry(&self, backends: &Backends, entry: &LoopEntry) -> Result<()> {
        let (Some(key), Some(backend)) = (&self.history_key, &backends.conversation_history) else {
            return Ok(());
        };
        backend.append_to_conversation_history(key, ConversationEntry::new(entry.role.clone(), entry.content.clone())).await?;
        Ok(())
    }

    pub async fn add_tool_response(&mut self, backends: &Backends, tool_name: &str, result: Value) -> Result<()> {
        let content = result.to_string();
        self.tool_responses.insert(tool_name.to_string(), result);
        let entry = LoopEntry { role: "tool".into(), tool_name: Some(tool_name.to_string()), content };
        self.persist_entry(backends, &entry).await?;
        self.conversation_history.push(entry);
        Ok(())
    }

    pub async fn add_tool_error(&mut self, backends: &Backends, tool_name: &str, error: &str) -> Result<()> {
        let message = format!("Error executing {tool_name}: {error}");
        self.tool_responses.insert(tool_name.to_string(), Value::String(message.clone()));
        self.errors.push(message.clone());
        let entry = LoopEntry { role: "tool_error".into(), tool_name: Some(tool_name.to_string()), content: message };
        self.persist_entry(backends, &entry).await?;
        self.conversation_history.push(entry);
        self.retry_count += 1;
        Ok(())
    }

    pub async fn add_system_error(&mut self, backends: &Backends, error: &str) -> Result<()> {
        self.errors.push(error.to_string());
        let entry = LoopEntry { role: "system_error".into(), tool_name: None, content: error.to_string() };
        self.persist_entry(backends, &entry).await?;
        self.conversation_history.push(entry);
        self.retry_count += 1;
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn execution_state(&self) -> ExecutionState {
        match self.conversation_history.last() {
            None => ExecutionState::Initial,
            Some(entry) => match entry.role.as_str() {
                "tool_error" => ExecutionState::ToolError,
                "system_error" => ExecutionState::Retry,
                "tool" => ExecutionState::ToolResponse,
                _ => ExecutionState::Initial,
            },
        }
    }

    pub fn context_for_llm(&self) -> String {
        if self.conversation_history.is_empty() {
            return String::new();
        }

        self.conversation_history
            .iter()
            .map(|entry| match entry.role.as_str() {
                "tool" => format!("[Tool: {}]\n{}", entry.tool_name.as_deref().unwrap_or(""), entry.content),
                "tool_error" => format!("[Tool Error: {}]\n{}", entry.tool_name.as_deref().unwrap_or(""), entry.content),
                "system_error" => format!("[System Error]\n{}", entry.content),
                _ => entry.content.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_in_initial_state_and_can_retry() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let state = AgentLoopState::create(None, &backends, 3).await.unwrap();
        assert_eq!(state.execution_state(), ExecutionState::Initial);
        assert!(state.can_retry());
    }

    #[tokio::test]
    async fn tool_error_increments_retry_count_and_state() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let mut state = AgentLoopState::create(None, &backends, 3).await.unwrap();
        state.add_tool_error(&backends, "search", "timeout").await.unwrap();
        assert_eq!(state.retry_count, 1);
        assert_eq!(state.execution_state(), ExecutionState::ToolError);
        assert!(state.context_for_llm().contains("[Tool Error: search]"));
    }

    #[tokio::test]
    async fn tool_response_does_not_increment_retry_count() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let mut state = AgentLoopState::create(None, &backends, 3).await.unwrap();
        state.add_tool_response(&backends, "search", serde_json::json!({"hits": 3})).await.unwrap();
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.execution_state(), ExecutionState::ToolResponse);
    }

    #[tokio::test]
    async fn max_retries_exhausted_stops_retry() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let mut state = AgentLoopState::create(None, &backends, 1).await.unwrap();
        state.add_system_error(&backends, "bad tool name").await.unwrap();
        assert!(!state.can_retry());
    }
}
