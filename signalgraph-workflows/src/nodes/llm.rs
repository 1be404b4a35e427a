//! ABOUTME: LLM node executor: render prompt, resolve LLM call, save output, emit signals
//! ABOUTME: Ported from nodes/llm/factory.py and nodes/llm/state.py
//!
//! Deliberate deviation from the source: that executor both calls
//! `save_output_to_context` (which appends via `set_field`) and then
//! manually appends `output_value` onto `context[output_field]` a
//! second time — a double append. This port performs the single
//! correct append via `save_output_to_context` only.

use serde_json::{json, Value};
use signalgraph_core::backend::Backends;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::schema::schema_to_root_schema;
use signalgraph_core::telemetry::EventKind;
use signalgraph_core::workflow::EventEmission;

use signalgraph_providers::{build_response_schema, extract_output_from_response, extract_signal_from_response, resolve_llm_call, LlmCaller, SignalOption};

use crate::context_io::save_output_to_context;
use crate::conversation_io::{get_conversation_history, save_conversation_turn};
use crate::expr::{get_context_for_prompt, render_prompt};
use crate::signals::{emit_completion_signals, handle_llm_failure, has_jinja_conditions};

fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Shared with the agent node's Response stage (both read `nodes/lib/output.py`'s rules).
pub fn needs_llm_signal_selection(event_emissions: &[EventEmission]) -> bool {
    if event_emissions.is_empty() || has_jinja_conditions(event_emissions) {
        return false;
    }
    event_emissions.iter().filter(|e| !e.signal_name.is_empty()).count() > 1
}

pub fn signal_options_for(event_emissions: &[EventEmission]) -> Vec<SignalOption> {
    if !needs_llm_signal_selection(event_emissions) {
        return Vec::new();
    }
    event_emissions
        .iter()
        .filter(|e| !e.signal_name.is_empty())
        .map(|e| SignalOption { name: e.signal_name.clone(), description: e.condition.clone() })
        .collect()
}

pub async fn output_schema_for(backends: &Backends, main_execution_id: ExecutionId, output_field: Option<&str>) -> Result<Option<Value>> {
    let (Some(field), Some(schema_backend)) = (output_field, &backends.context_schema) else {
        return Ok(None);
    };

    let Some(schema) = schema_backend.get_context_schema(main_execution_id).await? else {
        return Ok(None);
    };

    match schema.get(field) {
        Some(field_def) => Ok(Some(schema_to_root_schema(field_def, &format!("{}Root", titlecase(field))))),
        None => {
            signalgraph_events::register_event(
                backends,
                main_execution_id,
                EventKind::ContextWarning,
                json!({"message": format!("Output field '{field}' not found in context schema"), "output_field": field}),
            )
            .await?;
            Ok(None)
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_llm_node(
    backends: &Backends,
    llm_caller: &dyn LlmCaller,
    execution_id: ExecutionId,
    node_config_value: &Value,
    prompt: &str,
    identity: Option<&str>,
    output_field: Option<&str>,
    event_emissions: &[EventEmission],
    max_retries: u32,
    llm_failure_signal: Option<&str>,
) -> Result<Vec<String>> {
    signalgraph_events::register_event(backends, execution_id, EventKind::LlmCall, json!({"identity": identity})).await?;

    let context = backends.context.get_context(execution_id).await?;
    let (rendered_prompt, warnings) = render_prompt(prompt, &context);

    if !warnings.is_empty() {
        signalgraph_events::register_event(backends, execution_id, EventKind::ContextWarning, json!({"warnings": warnings})).await?;
    }

    let (history_key, conversation_history) = get_conversation_history(execution_id, identity, backends).await?;

    let (context_data, _) = get_context_for_prompt(&context, prompt);
    let context_str = if context_data.is_empty() { String::new() } else { serde_json::to_string_pretty(&context_data).unwrap_or_default() };
    let history_str = signalgraph_core::conversation::format_conversation_history(&conversation_history);

    let main_execution_id = context.operational().map(|op| op.main_execution_id).unwrap_or(execution_id);
    let output_schema = output_schema_for(backends, main_execution_id, output_field).await?;
    let signal_options = signal_options_for(event_emissions);

    let response_schema = build_response_schema(output_field, output_schema.as_ref(), &signal_options);

    let input_value = json!({
        "prompt": rendered_prompt,
        "context": context_str,
        "conversation_history": history_str,
    });

    match resolve_llm_call(llm_caller, &input_value, node_config_value, &response_schema, max_retries).await {
        Err(e) => handle_llm_failure(backends, execution_id, "llm", &e.to_string(), llm_failure_signal).await,
        Ok(raw_response) => {
            let output_value = extract_output_from_response(&raw_response, output_field);
            save_output_to_context(backends, execution_id, output_field, output_value.clone()).await?;

            let output_str = match &output_value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            save_conversation_turn(history_key, conversation_history, &rendered_prompt, &output_str, backends).await?;

            let selected_signal = extract_signal_from_response(&raw_response);
            let context_after_save = backends.context.get_context(execution_id).await?;
            emit_completion_signals(selected_signal.as_deref(), event_emissions, &context_after_save)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalgraph_core::context::Context;
    use signalgraph_providers::EchoCaller;

    #[tokio::test]
    async fn saves_output_and_emits_single_signal() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();

        let caller = EchoCaller { response: r#"{"output": "hello"}"#.into() };
        let emissions = vec![EventEmission { signal_name: "DONE".into(), condition: None }];

        let signals = execute_llm_node(&backends, &caller, id, &json!({}), "Say hi", None, Some("greeting"), &emissions, 1, None)
            .await
            .unwrap();

        assert_eq!(signals, vec!["DONE".to_string()]);
        let context = backends.context.get_context(id).await.unwrap();
        assert_eq!(context.get("greeting"), Some(&json!(["hello"])));
    }

    #[tokio::test]
    async fn failure_without_signal_surfaces_error() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();

        let caller = EchoCaller { response: "not json".into() };
        let err = execute_llm_node(&backends, &caller, id, &json!({}), "Say hi", None, None, &[], 0, None).await.unwrap_err();
        assert!(err.to_string().contains("Max retries"));
    }

    #[tokio::test]
    async fn failure_with_signal_returns_failure_signal() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();

        let caller = EchoCaller { response: "not json".into() };
        let signals = execute_llm_node(&backends, &caller, id, &json!({}), "Say hi", None, None, &[], 0, Some("LLM_FAILED")).await.unwrap();
        assert_eq!(signals, vec!["LLM_FAILED".to_string()]);
    }
}
