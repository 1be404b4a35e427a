//! ABOUTME: Router node executor
//! ABOUTME: Ported from nodes/router/factory.py — pure condition evaluation, no side effects

use signalgraph_core::context::Context;
use signalgraph_core::error::Result;
use signalgraph_core::workflow::EventEmission;

use crate::context_io::unwrap_context;
use crate::expr::evaluate_conditions;

/// Evaluate a router's `event_emissions` against the current context and
/// return whichever signals pass. A router never writes to context and
/// never fails a call_llm/tool_call — it's pure condition evaluation.
pub fn execute_router_node(event_emissions: &[EventEmission], context: &Context) -> Result<Vec<String>> {
    let unwrapped = unwrap_context(context);
    let render_context = serde_json::json!({"context": unwrapped});
    Ok(evaluate_conditions(event_emissions, &render_context, Some(context)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use signalgraph_core::context::set_field;
    use signalgraph_core::workflow::EventEmission;

    #[test]
    fn emits_passing_jinja_signals() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "ready", json!(true));
        let emissions = vec![EventEmission { signal_name: "GO".into(), condition: Some("{{ context.ready }}".into()) }];
        let signals = execute_router_node(&emissions, &ctx).unwrap();
        assert_eq!(signals, vec!["GO".to_string()]);
    }

    #[test]
    fn plain_condition_always_emits() {
        let ctx = Context::new();
        let emissions = vec![EventEmission { signal_name: "ALWAYS".into(), condition: None }];
        let signals = execute_router_node(&emissions, &ctx).unwrap();
        assert_eq!(signals, vec!["ALWAYS".to_string()]);
    }
}
