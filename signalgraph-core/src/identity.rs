//! ABOUTME: Identity definitions used to seed conversation history
//! ABOUTME: Named personas whose system prompt becomes a history's first message

use std::collections::HashMap;

/// `identity_name -> system_prompt`, keyed per execution by a
/// [`crate::identity::IdentityBackend`] implementation.
pub type IdentitySet = HashMap<String, String>;

pub fn format_system_prompt_for_history(system_prompt: Option<&str>) -> String {
    match system_prompt {
        Some(prompt) if !prompt.is_empty() => format!("[system]: {prompt}"),
        _ => String::new(),
    }
}
