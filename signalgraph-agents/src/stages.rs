//! ABOUTME: The three LLM stages of the agent loop: Router, Parameter, Response
//! ABOUTME: Ported from agent/types.py and agent/stages/{router,parameter,response}.py

use serde_json::{json, Value};
use signalgraph_core::error::{Result, WorkflowError};

use signalgraph_providers::{build_response_schema, extract_output_from_response, extract_signal_from_response, resolve_llm_call, LlmCaller, SignalOption};

/// The Router stage's decision: call a tool, or finish the loop.
#[derive(Debug, Clone)]
pub struct RouterDecision {
    pub action: RouterAction,
    pub tool_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterAction {
    CallTool,
    Finish,
}

fn router_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["call_tool", "finish"]},
            "tool_name": {"type": ["string", "null"]},
        },
        "required": ["action"],
    })
}

/// Decide the agent's next action: call a tool, or produce a final response.
#[allow(clippy::too_many_arguments)]
pub async fn execute_router_stage(
    llm_caller: &dyn LlmCaller,
    state_instructions: &str,
    task_description: &str,
    context: &str,
    available_tools: &str,
    conversation_history: &str,
    node_config_value: &Value,
    max_retries: u32,
) -> Result<RouterDecision> {
    let input = json!({
        "instructions": state_instructions,
        "task_description": task_description,
        "context": context,
        "available_tools": available_tools,
        "conversation_history": conversation_history,
    });

    let response = resolve_llm_call(llm_caller, &input, node_config_value, &router_response_schema(), max_retries).await?;

    let action = match response.get("action").and_then(Value::as_str) {
        Some("call_tool") => RouterAction::CallTool,
        Some("finish") => RouterAction::Finish,
        other => return Err(WorkflowError::Provider(format!("router stage returned unexpected action: {other:?}"))),
    };
    let tool_name = response.get("tool_name").and_then(Value::as_str).map(str::to_string);

    Ok(RouterDecision { action, tool_name })
}

/// Generate the arguments for the tool the Router stage chose, validated
/// against that tool's `parameters_schema`.
pub async fn execute_parameter_stage(
    llm_caller: &dyn LlmCaller,
    task_description: &str,
    context: &str,
    tool_name: &str,
    conversation_history: &str,
    node_config_value: &Value,
    parameters_schema: &Value,
    max_retries: u32,
) -> Result<Value> {
    let input = json!({
        "task_description": task_description,
        "context": context,
        "tool_name": tool_name,
        "conversation_history": conversation_history,
    });

    resolve_llm_call(llm_caller, &input, node_config_value, parameters_schema, max_retries).await
}

/// The agent loop's final output, mirroring what a plain `llm` node
/// node produces: an output value plus (optionally) the signal the
/// Response stage chose to emit.
#[derive(Debug, Clone)]
pub struct FinalResponse {
    pub output: Value,
    pub selected_signal: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_response_stage(
    llm_caller: &dyn LlmCaller,
    task_description: &str,
    context: &str,
    conversation_history: &str,
    node_config_value: &Value,
    output_field: Option<&str>,
    output_schema: Option<&Value>,
    signal_options: &[SignalOption],
    max_retries: u32,
) -> Result<FinalResponse> {
    let input = json!({
        "task_description": task_description,
        "context": context,
        "conversation_history": conversation_history,
    });

    let response_schema = build_response_schema(output_field, output_schema, signal_options);
    let raw_response = resolve_llm_call(llm_caller, &input, node_config_value, &response_schema, max_retries).await?;

    let output = extract_output_from_response(&raw_response, output_field);
    let selected_signal = extract_signal_from_response(&raw_response);

    Ok(FinalResponse { output, selected_signal })
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalgraph_providers::EchoCaller;

    #[tokio::test]
    async fn router_stage_parses_finish_action() {
        let caller = EchoCaller { response: r#"{"action": "finish"}"#.into() };
        let decision = execute_router_stage(&caller, "instructions", "task", "{}", "", "", &json!({}), 1).await.unwrap();
        assert_eq!(decision.action, RouterAction::Finish);
        assert!(decision.tool_name.is_none());
    }

    #[tokio::test]
    async fn router_stage_parses_call_tool_action() {
        let caller = EchoCaller { response: r#"{"action": "call_tool", "tool_name": "search"}"#.into() };
        let decision = execute_router_stage(&caller, "instructions", "task", "{}", "", "", &json!({}), 1).await.unwrap();
        assert_eq!(decision.action, RouterAction::CallTool);
        assert_eq!(decision.tool_name.as_deref(), Some("search"));
    }

    #[tokio::test]
    async fn parameter_stage_returns_validated_arguments() {
        let caller = EchoCaller { response: r#"{"query": "rust async"}"#.into() };
        let schema = json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]});
        let args = execute_parameter_stage(&caller, "task", "{}", "search", "", &json!({}), &schema, 1).await.unwrap();
        assert_eq!(args["query"], "rust async");
    }

    #[tokio::test]
    async fn response_stage_extracts_output_and_signal() {
        let caller = EchoCaller { response: r#"{"output": "done", "selected_signal": "COMPLETE"}"#.into() };
        let signal_options = vec![SignalOption { name: "COMPLETE".into(), description: None }, SignalOption { name: "FAILED".into(), description: None }];
        let response = execute_response_stage(&caller, "task", "{}", "", &json!({}), Some("result"), None, &signal_options, 1).await.unwrap();
        assert_eq!(response.output, "done");
        assert_eq!(response.selected_signal.as_deref(), Some("COMPLETE"));
    }
}
