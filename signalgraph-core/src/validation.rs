//! ABOUTME: Fail-fast validation for workflow configs and operational state
//! ABOUTME: Per-node-kind config checks run once at orchestration start
//!
//! Operational-state checks run before every node execution so node
//! bodies can trust context shape without defensive programming.

use crate::context::Context;
use crate::error::{Result, WorkflowError};
use crate::workflow::NodeConfig;

fn invalid(message: impl Into<String>) -> WorkflowError {
    WorkflowError::Validation(message.into())
}

/// Confirm `__operational__` is present and well-formed. Node executors
/// call this before touching a context; a missing or malformed
/// `__operational__` means something upstream failed to initialize the
/// context correctly, which is a bug worth surfacing immediately rather
/// than papering over with a default.
pub fn validate_operational(context: &Context) -> Result<()> {
    context
        .operational()
        .ok_or_else(|| invalid("context is missing '__operational__' — initialize_operational_context must run before node execution"))?;
    Ok(())
}

/// Validate Jinja/Tera template syntax at config time, catching unclosed
/// braces and unknown filters before a single node executes. Does not
/// (cannot) catch runtime-only errors like an undefined variable — those
/// depend on the context values a signal broadcast is carrying.
pub fn validate_jinja_syntax(template: &str, context_description: &str) -> Result<()> {
    if template.is_empty() || (!template.contains("{{") && !template.contains("{%")) {
        return Ok(());
    }
    let mut tera = tera::Tera::default();
    tera.register_filter("accumulated", |value: &tera::Value, _: &std::collections::HashMap<String, tera::Value>| Ok(value.clone()));
    tera.add_raw_template("__validate__", template)
        .map_err(|e| invalid(format!("{context_description}: Jinja syntax error - {e}")))?;
    Ok(())
}

fn validate_event_emissions(event_emissions: &[crate::workflow::EventEmission], context_description_prefix: &str) -> Result<()> {
    if event_emissions.is_empty() {
        return Err(invalid(format!(
            "{context_description_prefix}'event_emissions' is required - specify which signals to emit based on conditions"
        )));
    }
    for emission in event_emissions {
        if emission.signal_name.is_empty() {
            return Err(invalid(format!("{context_description_prefix}event emission is missing 'signal_name'")));
        }
        if let Some(condition) = &emission.condition {
            validate_jinja_syntax(condition, &format!("Event emission '{}' condition", emission.signal_name))?;
        }
    }
    Ok(())
}

fn validate_output_field(output_field: Option<&str>) -> Result<()> {
    if output_field == Some(crate::context::OPERATIONAL_KEY) {
        return Err(invalid("'output_field' cannot be '__operational__' - this is a reserved system field"));
    }
    Ok(())
}

/// Per-node-kind structural validation. Type and presence checks that a
/// dynamically-typed config dict needs are largely absorbed by
/// `NodeConfig`'s tagged-enum `Deserialize` impl; what's left here are
/// the checks that survive strong typing: non-empty lists, reserved
/// field names, jinja syntax, and cross-field constraints.
pub fn validate_node_config(node_config: &NodeConfig) -> Result<()> {
    match node_config {
        NodeConfig::Router { event_triggers, event_emissions } => {
            if event_triggers.is_empty() {
                return Err(invalid("'event_triggers' is required - specify which signals activate this router"));
            }
            validate_event_emissions(event_emissions, "")?;
        }
        NodeConfig::Tool { event_triggers, tool_name, event_emissions, output_field, .. } => {
            if event_triggers.is_empty() {
                return Err(invalid("'event_triggers' is required - specify which signals activate this tool node"));
            }
            if tool_name.is_empty() {
                return Err(invalid("'tool_name' is required - specify which tool to execute"));
            }
            for emission in event_emissions {
                if emission.signal_name.is_empty() {
                    return Err(invalid("event_emissions entry must have 'signal_name'"));
                }
            }
            validate_output_field(output_field.as_deref())?;
        }
        NodeConfig::Llm { event_triggers, prompt, output_field, retries: _, event_emissions, .. } => {
            if event_triggers.is_empty() {
                return Err(invalid("'event_triggers' is required - specify which signals activate this LLM node"));
            }
            if prompt.is_empty() {
                return Err(invalid("'prompt' is required - provide the prompt template for the LLM"));
            }
            validate_output_field(output_field.as_deref())?;
            for emission in event_emissions {
                if emission.signal_name.is_empty() {
                    return Err(invalid("event_emissions entry must have 'signal_name'"));
                }
                if let Some(condition) = &emission.condition {
                    validate_jinja_syntax(condition, &format!("Event emission '{}' condition", emission.signal_name))?;
                }
            }
        }
        NodeConfig::Agent { event_triggers, prompt, output_field, event_emissions, .. } => {
            if event_triggers.is_empty() {
                return Err(invalid("'event_triggers' is required - specify which signals activate this agent"));
            }
            if prompt.is_empty() {
                return Err(invalid("'prompt' is required - provide the agent's task description or instructions"));
            }
            validate_output_field(output_field.as_deref())?;
            for emission in event_emissions {
                if emission.signal_name.is_empty() {
                    return Err(invalid("event_emissions entry must have 'signal_name'"));
                }
                if let Some(condition) = &emission.condition {
                    validate_jinja_syntax(condition, &format!("Event emission '{}' condition", emission.signal_name))?;
                }
            }
        }
        NodeConfig::Child {
            child_workflow_name,
            child_initial_signals,
            event_triggers,
            fan_out_field,
            child_input_field,
            spawn_interval,
            event_emissions,
            ..
        } => {
            if child_workflow_name.is_empty() {
                return Err(invalid("'child_workflow_name' is required - specify which workflow to start as a child"));
            }
            if child_initial_signals.is_empty() {
                return Err(invalid("'child_initial_signals' is required - specify which signals to start the child workflow with"));
            }
            if event_triggers.is_empty() {
                return Err(invalid("'event_triggers' is required - specify which signals trigger the start of the child workflow"));
            }
            if fan_out_field.is_some() && child_input_field.is_none() {
                return Err(invalid(
                    "'child_input_field' is required when 'fan_out_field' is set - specify which field in child context receives each item",
                ));
            }
            if *spawn_interval < 0.0 {
                return Err(invalid("'spawn_interval' must be non-negative"));
            }
            for emission in event_emissions {
                if emission.signal_name.is_empty() {
                    return Err(invalid("event_emissions entry must have 'signal_name'"));
                }
                if let Some(condition) = &emission.condition {
                    validate_jinja_syntax(condition, &format!("Event emission '{}' condition", emission.signal_name))?;
                }
            }
        }
    }
    Ok(())
}
