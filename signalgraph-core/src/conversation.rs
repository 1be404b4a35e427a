//! ABOUTME: Conversation history types
//! ABOUTME: The turn-by-turn log an llm/agent node persists when configured with an identity

use serde::{Deserialize, Serialize};

/// One turn in a conversation history. `tool_name` is only populated for
/// `tool`/`tool_error` roles, matching the agent loop's richer entry
/// shape layered on top of the plain user/assistant/system turns an
/// `llm` node writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ConversationEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into(), tool_name: None }
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: "tool".into(), content: content.into(), tool_name: Some(tool_name.into()) }
    }

    pub fn tool_error(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: "tool_error".into(), content: content.into(), tool_name: Some(tool_name.into()) }
    }

    pub fn system_error(content: impl Into<String>) -> Self {
        Self { role: "system_error".into(), content: content.into(), tool_name: None }
    }
}

pub type ConversationHistory = Vec<ConversationEntry>;

/// Render a conversation history as `[role]: content` lines, the format
/// an `llm` node's prompt embeds.
pub fn format_conversation_history(history: &[ConversationEntry]) -> String {
    history
        .iter()
        .map(|entry| format!("[{}]: {}", entry.role, entry.content))
        .collect::<Vec<_>>()
        .join("\n")
}
