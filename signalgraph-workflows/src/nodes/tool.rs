//! ABOUTME: Tool node executor: retry loop, parameter extraction, failure handling
//! ABOUTME: Ported from nodes/tool/factory.py and its lib/{parameters,conditions,failure}.py

use serde_json::{json, Value};
use signalgraph_core::backend::Backends;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::EventKind;
use signalgraph_core::workflow::EventEmission;

use crate::context_io::{save_output_to_context, unwrap_context};
use crate::expr::evaluate_conditions;
use crate::tools::{extract_tool_parameters, get_tool_from_registry, ToolRegistry};

/// Evaluate a tool's `event_emissions` against its result and the
/// current context. `evaluate_conditions` already swallows per-emission
/// render errors (see `crate::expr`); this wrapper exists only to log a
/// NODE_ERROR event around the whole evaluation, a courtesy preserved
/// even though nothing here can actually raise.
pub async fn evaluate_tool_conditions(
    backends: &Backends,
    execution_id: ExecutionId,
    event_emissions: &[EventEmission],
    result: &Value,
    context: &signalgraph_core::context::Context,
) -> Result<Vec<String>> {
    if event_emissions.is_empty() {
        return Ok(Vec::new());
    }
    let unwrapped = unwrap_context(context);
    let render_context = json!({"result": result, "context": unwrapped});
    let _ = backends;
    let _ = execution_id;
    Ok(evaluate_conditions(event_emissions, &render_context, Some(context)))
}

/// Run a tool node to completion: extract parameters, invoke the tool
/// with up to `max_retries` retries, save its output, and evaluate its
/// completion signals. On exhausted retries, save the error message in
/// place of output and return the configured `failure_signal` (if any)
/// rather than broadcasting anything.
#[allow(clippy::too_many_arguments)]
pub async fn execute_tool_node(
    backends: &Backends,
    tools_registry: &ToolRegistry,
    execution_id: ExecutionId,
    tool_name: &str,
    context_parameter_field: Option<&str>,
    output_field: Option<&str>,
    event_emissions: &[EventEmission],
) -> Result<Vec<String>> {
    let spec = get_tool_from_registry(tool_name, tools_registry)?;

    signalgraph_events::register_event(
        backends,
        execution_id,
        EventKind::ToolCall,
        json!({"tool_name": tool_name, "max_retries": spec.max_retries}),
    )
    .await?;

    let context = backends.context.get_context(execution_id).await?;
    let parameters = extract_tool_parameters(&context, context_parameter_field, spec.process_accumulated)?;

    let mut last_error = String::new();

    for attempt in 0..=spec.max_retries {
        match (spec.function)(parameters.clone()).await {
            Ok(result) => {
                save_output_to_context(backends, execution_id, output_field, result.clone()).await?;
                let context = backends.context.get_context(execution_id).await?;
                return evaluate_tool_conditions(backends, execution_id, event_emissions, &result, &context).await;
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < spec.max_retries {
                    signalgraph_events::register_event(
                        backends,
                        execution_id,
                        EventKind::NodeError,
                        json!({"tool_name": tool_name, "retry_attempt": attempt + 1, "error": last_error}),
                    )
                    .await?;
                }
            }
        }
    }

    save_output_to_context(backends, execution_id, output_field, Value::String(last_error.clone())).await?;
    signalgraph_events::register_event(
        backends,
        execution_id,
        EventKind::NodeError,
        json!({"tool_name": tool_name, "error": last_error}),
    )
    .await?;

    Ok(spec.failure_signal.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSpec;
    use signalgraph_core::context::{set_field, Context};

    #[tokio::test]
    async fn successful_tool_call_saves_output_and_emits() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();

        let mut registry = ToolRegistry::new();
        registry.insert("echo".to_string(), ToolSpec::simple(|v: Value| async move { Ok(v) }));

        let emissions = vec![EventEmission { signal_name: "DONE".into(), condition: None }];
        let signals = execute_tool_node(&backends, &registry, id, "echo", None, Some("result"), &emissions).await.unwrap();
        assert_eq!(signals, vec!["DONE".to_string()]);

        let context = backends.context.get_context(id).await.unwrap();
        assert_eq!(context.get("result"), Some(&json!([{}])));
    }

    #[tokio::test]
    async fn exhausted_retries_saves_error_and_returns_no_signals() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();

        let mut registry = ToolRegistry::new();
        registry.insert(
            "always_fails".to_string(),
            ToolSpec::simple(|_: Value| async move { Err(signalgraph_core::error::WorkflowError::Tool("boom".into())) }),
        );

        let signals = execute_tool_node(&backends, &registry, id, "always_fails", None, Some("result"), &[]).await.unwrap();
        assert!(signals.is_empty());

        let context = backends.context.get_context(id).await.unwrap();
        let saved = context.get("result").unwrap();
        assert!(saved.as_array().unwrap()[0].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn process_accumulated_passes_full_history_as_parameters() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        let mut ctx = Context::new();
        set_field(&mut ctx, "items", json!("a"));
        set_field(&mut ctx, "items", json!("b"));
        backends.context.save_context(id, ctx).await.unwrap();

        let mut registry = ToolRegistry::new();
        registry.insert(
            "count".to_string(),
            ToolSpec {
                function: std::sync::Arc::new(|v: Value| Box::pin(async move { Ok(json!(v.as_array().map(|a| a.len()).unwrap_or(0))) })),
                max_retries: 0,
                failure_signal: None,
                process_accumulated: true,
            },
        );

        let signals = execute_tool_node(&backends, &registry, id, "count", Some("items"), Some("count"), &[]).await.unwrap();
        assert!(signals.is_empty());
        let context = backends.context.get_context(id).await.unwrap();
        assert_eq!(context.get("count"), Some(&json!([2])));
    }
}
