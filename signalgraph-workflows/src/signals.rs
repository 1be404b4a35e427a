//! ABOUTME: Signal emission for LLM-based nodes: priority order and failure handling
//! ABOUTME: Ported from the llm/agent nodes' shared signal_emission/signals helpers

use serde_json::{json, Map, Value};
use signalgraph_core::backend::Backends;
use signalgraph_core::context::{get_field, Context};
use signalgraph_core::error::{Result, WorkflowError};
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::EventKind;
use signalgraph_core::workflow::EventEmission;

use crate::expr::evaluate_conditions;

/// True if any emission's condition is a Jinja expression rather than
/// plain descriptive text.
pub fn has_jinja_conditions(event_emissions: &[EventEmission]) -> bool {
    event_emissions.iter().any(EventEmission::is_jinja_condition)
}

fn unwrap_context_for_render(context: &Context) -> Map<String, Value> {
    let mut unwrapped = Map::new();
    for key in context.keys() {
        if Context::is_internal_field(key) {
            unwrapped.insert(key.clone(), context.get(key).cloned().unwrap_or(Value::Null));
        } else if let Some(value) = get_field(context, key) {
            unwrapped.insert(key.clone(), value);
        }
    }
    unwrapped
}

/// Evaluate every emission's Jinja condition against the node's
/// context and return the signals that pass, matching
/// `_evaluate_emission_conditions`'s jinja branch.
pub fn evaluate_emission_conditions(event_emissions: &[EventEmission], context: &Context) -> Vec<String> {
    let unwrapped = unwrap_context_for_render(context);
    evaluate_conditions(event_emissions, &json!({"context": unwrapped}), Some(context))
}

/// Record the failure and either return a failure signal to broadcast
/// or surface an error, the way `handle_llm_failure` either emits a
/// configured `failure_signal` or raises.
pub async fn handle_llm_failure(
    backends: &Backends,
    execution_id: ExecutionId,
    node_type: &str,
    error_message: &str,
    failure_signal: Option<&str>,
) -> Result<Vec<String>> {
    signalgraph_events::register_event(
        backends,
        execution_id,
        EventKind::NodeError,
        json!({"node_type": node_type, "error": error_message}),
    )
    .await?;

    match failure_signal {
        Some(signal) => Ok(vec![signal.to_string()]),
        None => Err(WorkflowError::NodeExecution(error_message.to_string())),
    }
}

/// Decide which signals an LLM/agent node emits on success, in the
/// exact priority order `emit_completion_signals` enforces:
///
/// 1. an LLM-selected signal wins outright
/// 2. else, if any emission has a Jinja condition, evaluate all of them
///    and emit whichever pass (zero or more)
/// 3. else, if exactly one plain-text signal is configured, emit it
///    unconditionally
/// 4. else, more than one plain-text signal with nothing to choose
///    between them is a configuration error
pub fn emit_completion_signals(selected_signal: Option<&str>, event_emissions: &[EventEmission], context: &Context) -> Result<Vec<String>> {
    if let Some(signal) = selected_signal {
        return Ok(vec![signal.to_string()]);
    }

    if event_emissions.is_empty() {
        return Ok(Vec::new());
    }

    if has_jinja_conditions(event_emissions) {
        return Ok(evaluate_emission_conditions(event_emissions, context));
    }

    let plain_signals: Vec<String> = event_emissions.iter().map(|e| e.signal_name.clone()).collect();

    match plain_signals.len() {
        0 => Ok(Vec::new()),
        1 => Ok(plain_signals),
        _ => Err(WorkflowError::NodeExecution(format!("Multiple signals defined but no selection made: {plain_signals:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalgraph_core::context::set_field;

    fn emission(name: &str, condition: Option<&str>) -> EventEmission {
        EventEmission { signal_name: name.to_string(), condition: condition.map(String::from) }
    }

    #[test]
    fn selected_signal_wins_outright() {
        let emissions = vec![emission("A", None), emission("B", None)];
        let ctx = Context::new();
        let signals = emit_completion_signals(Some("CHOSEN"), &emissions, &ctx).unwrap();
        assert_eq!(signals, vec!["CHOSEN".to_string()]);
    }

    #[test]
    fn single_plain_signal_emits_unconditionally() {
        let emissions = vec![emission("DONE", None)];
        let ctx = Context::new();
        let signals = emit_completion_signals(None, &emissions, &ctx).unwrap();
        assert_eq!(signals, vec!["DONE".to_string()]);
    }

    #[test]
    fn multiple_plain_signals_without_selection_errors() {
        let emissions = vec![emission("A", None), emission("B", None)];
        let ctx = Context::new();
        let err = emit_completion_signals(None, &emissions, &ctx).unwrap_err();
        assert!(err.to_string().contains("Multiple signals defined"));
    }

    #[test]
    fn jinja_conditions_emit_passing_signals_only() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "ok", serde_json::json!(true));
        let emissions = vec![emission("YES", Some("{{ context.ok }}")), emission("NO", Some("{{ not context.ok }}"))];
        let signals = emit_completion_signals(None, &emissions, &ctx).unwrap();
        assert_eq!(signals, vec!["YES".to_string()]);
    }
}
