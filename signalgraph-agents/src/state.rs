//! ABOUTME: Per-loop-iteration context preparation for the agent node
//! ABOUTME: Ported from agent/state.py's prepare_agent_context (trimmed: NodeConfig::Agent already carries what AgentOperationalState duplicated)

use serde_json::Value;
use signalgraph_core::context::Context;
use signalgraph_workflows::expr::{get_context_for_prompt, render_prompt};

/// Context data assembled fresh on every loop iteration, since tool
/// responses recorded on prior iterations change what a re-render of
/// the prompt and context filter would produce.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub agent_prompt: String,
    pub context_string: String,
    pub error_note: String,
}

pub fn prepare_agent_context(context: &Context, prompt_template: &str, tool_responses: &std::collections::HashMap<String, Value>) -> AgentContext {
    let (agent_prompt, _) = render_prompt(prompt_template, context);
    let (filtered_context, _) = get_context_for_prompt(context, prompt_template);
    let context_string = if filtered_context.is_empty() { String::new() } else { serde_json::to_string_pretty(&filtered_context).unwrap_or_default() };

    let has_errors = tool_responses.values().any(|v| v.to_string().contains("Error:"));
    let error_note =
        if has_errors { "\n⚠️  Previous tool calls had errors. Please fix the parameters and try again.".to_string() } else { String::new() };

    AgentContext { agent_prompt, context_string, error_note }
}
