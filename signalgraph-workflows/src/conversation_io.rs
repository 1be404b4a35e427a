//! ABOUTME: Conversation history retrieval/persistence for identity-bearing nodes
//! ABOUTME: Ported from nodes/lib/conversation_history.py

use signalgraph_core::backend::Backends;
use signalgraph_core::conversation::{ConversationEntry, ConversationHistory};
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;

/// Look up conversation history for a node with an `identity`. Keyed by
/// `main_execution_id` so history persists across sub-orchestration
/// boundaries. When history is empty and an identity backend has a
/// system prompt for this identity, that prompt is injected as the
/// first message.
///
/// Returns `(history_key, history)`; `history_key` is `None` when there's
/// no identity or no conversation-history backend configured, meaning
/// nothing should be persisted later.
pub async fn get_conversation_history(
    execution_id: ExecutionId,
    identity: Option<&str>,
    backends: &Backends,
) -> Result<(Option<ExecutionId>, ConversationHistory)> {
    let (Some(identity), Some(conversation_backend)) = (identity, &backends.conversation_history) else {
        return Ok((None, Vec::new()));
    };

    let context = backends.context.get_context(execution_id).await?;
    let main_id = context.operational().map(|op| op.main_execution_id).unwrap_or(execution_id);

    let mut history = conversation_backend.get_conversation_history(&main_id.to_string()).await?;

    if history.is_empty() {
        if let Some(identity_backend) = &backends.identity {
            if let Some(system_prompt) = identity_backend.get_identity(main_id, identity).await? {
                if !system_prompt.is_empty() {
                    history = vec![ConversationEntry::new("system", system_prompt)];
                    conversation_backend.save_conversation_history(&main_id.to_string(), history.clone()).await?;
                }
            }
        }
    }

    Ok((Some(main_id), history))
}

/// Append a user/assistant turn to a node's conversation history.
/// No-ops when there's no `history_key` (no identity/backend).
pub async fn save_conversation_turn(
    history_key: Option<ExecutionId>,
    mut conversation_history: ConversationHistory,
    user_content: &str,
    assistant_content: &str,
    backends: &Backends,
) -> Result<()> {
    let (Some(history_key), Some(conversation_backend)) = (history_key, &backends.conversation_history) else {
        return Ok(());
    };

    conversation_history.push(ConversationEntry::new("user", user_content));
    conversation_history.push(ConversationEntry::new("assistant", assistant_content));
    conversation_backend.save_conversation_history(&history_key.to_string(), conversation_history).await?;
    Ok(())
}
