//! ABOUTME: The agent's tool registry and prompt-signature loading
//! ABOUTME: Ported from agent/lib/tools.py and nodes/lib/tools.py's get_tool_signature/create_tool_schema
//!
//! A Rust closure carries no reflectable signature, so both a tool's
//! signature string and its parameter schema are supplied explicitly
//! at registration time instead of being derived from the callable.

use std::collections::HashMap;

use serde_json::{json, Value};
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::EventKind;
use signalgraph_workflows::ToolFn;

/// One tool an agent can call: the function itself, a retry budget, the
/// prompt-facing signature line, and the JSON schema its arguments must
/// validate against (used as the Parameter stage's response schema).
#[derive(Clone)]
pub struct AgentToolSpec {
    pub function: ToolFn,
    pub max_retries: u32,
    pub signature: String,
    pub parameters_schema: Value,
}

impl std::fmt::Debug for AgentToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentToolSpec").field("max_retries", &self.max_retries).field("signature", &self.signature).finish_non_exhaustive()
    }
}

pub type AgentToolRegistry = HashMap<String, AgentToolSpec>;

pub fn get_agent_tool<'a>(tool_name: &str, registry: &'a AgentToolRegistry) -> Option<&'a AgentToolSpec> {
    registry.get(tool_name)
}

/// Build the `available_tools` block for the Router stage's prompt:
/// one signature line per tool the node is configured to use. Tool
/// names that aren't in the registry are silently skipped here — the
/// Router stage will hit `AGENT_TOOL_NOT_FOUND` if it tries to call one.
pub fn build_tools_signature(tool_names: &[String], registry: &AgentToolRegistry) -> String {
    tool_names.iter().filter_map(|name| registry.get(name).map(|spec| spec.signature.clone())).collect::<Vec<_>>().join("\n\n")
}

pub async fn register_tools_loaded_event(
    backends: &signalgraph_core::backend::Backends,
    execution_id: ExecutionId,
    node_name: &str,
    tool_names: &[String],
    registry: &AgentToolRegistry,
) -> Result<()> {
    signalgraph_events::register_event(
        backends,
        execution_id,
        EventKind::AgentToolsLoaded,
        json!({"node_name": node_name, "agent_tools": tool_names, "registry_tools": registry.keys().collect::<Vec<_>>()}),
    )
    .await
}
