//! ABOUTME: Unified event registration for telemetry and operational state
//! ABOUTME: Records events to the telemetry backend and updates operational counters

use serde_json::{json, Value};
use signalgraph_core::backend::Backends;
use signalgraph_core::context::{self, Context};
use signalgraph_core::error::{Result, WorkflowError};
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::EventKind;
use tracing::debug;

/// Log `event_type` to telemetry (if a telemetry backend is configured)
/// and fold its effect into `__operational__`'s counters.
///
/// This is the single place operational counters are mutated; node
/// executors never touch `operational.signals`/`nodes`/`llm_calls`/
/// `tool_calls`/`errors` directly. `signals` is append-only with no
/// deduplication by design (the same signal broadcast twice is recorded
/// twice) — testable property P4 depends on this.
pub async fn register_event(backends: &Backends, execution_id: ExecutionId, event_type: EventKind, data: Value) -> Result<()> {
    if let Some(telemetry) = &backends.telemetry {
        telemetry.log_event(execution_id, event_type, data.clone()).await?;
    }

    match event_type {
        EventKind::SignalsBroadcast => {
            let signals = data
                .get("signals")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
                .unwrap_or_default();
            update_operational(backends, execution_id, |op| op.signals.extend(signals)).await?;
        }
        EventKind::NodeExecution => {
            if let Some(node_name) = data.get("node_name").and_then(Value::as_str) {
                let node_name = node_name.to_string();
                update_operational(backends, execution_id, |op| {
                    *op.nodes.entry(node_name).or_insert(0) += 1;
                })
                .await?;
            }
        }
        EventKind::LlmCall => {
            update_operational(backends, execution_id, |op| op.llm_calls += 1).await?;
        }
        EventKind::NodeError => {
            update_operational(backends, execution_id, |op| op.errors += 1).await?;
        }
        EventKind::ToolCall | EventKind::AgentToolCall => {
            update_operational(backends, execution_id, |op| op.tool_calls += 1).await?;
        }
        other => {
            debug!(?other, "event logged with no operational-state effect");
        }
    }

    Ok(())
}

async fn update_operational<F>(backends: &Backends, execution_id: ExecutionId, mutate: F) -> Result<()>
where
    F: FnOnce(&mut context::Operational),
{
    let mut ctx: Context = backends.context.get_context(execution_id).await?;
    let mut operational = ctx
        .operational()
        .ok_or_else(|| WorkflowError::Operational(format!("no '__operational__' for execution_id '{execution_id}'")))?;
    mutate(&mut operational);
    ctx.set_operational(&operational);
    backends.context.save_context(execution_id, ctx).await?;
    Ok(())
}

/// Convenience constructor for the `{"signals": [...]}` payload
/// `SIGNALS_BROADCAST` events carry.
pub fn signals_broadcast_data(signals: &[String]) -> Value {
    json!({ "signals": signals })
}

/// Convenience constructor for the `{"node_name": ...}` payload
/// `NODE_EXECUTION` events carry.
pub fn node_execution_data(node_name: &str) -> Value {
    json!({ "node_name": node_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalgraph_core::context::add_operational_state;

    fn backends_with_fresh_context(execution_id: ExecutionId) -> (Backends, tokio::runtime::Runtime) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let backends = rt.block_on(async {
            let backends = crate::testing::in_memory_backends();
            let mut ctx = Context::new();
            add_operational_state(execution_id, &mut ctx);
            backends.context.save_context(execution_id, ctx).await.unwrap();
            backends
        });
        (backends, rt)
    }

    #[test]
    fn signals_broadcast_appends_without_dedup() {
        let execution_id = ExecutionId::new();
        let (backends, rt) = backends_with_fresh_context(execution_id);
        rt.block_on(async {
            register_event(&backends, execution_id, EventKind::SignalsBroadcast, signals_broadcast_data(&["START".into()]))
                .await
                .unwrap();
            register_event(&backends, execution_id, EventKind::SignalsBroadcast, signals_broadcast_data(&["START".into()]))
                .await
                .unwrap();
            let ctx = backends.context.get_context(execution_id).await.unwrap();
            let operational = ctx.operational().unwrap();
            assert_eq!(operational.signals, vec!["START".to_string(), "START".to_string()]);
        });
    }

    #[test]
    fn node_execution_increments_per_node_counter() {
        let execution_id = ExecutionId::new();
        let (backends, rt) = backends_with_fresh_context(execution_id);
        rt.block_on(async {
            register_event(&backends, execution_id, EventKind::NodeExecution, node_execution_data("router_1")).await.unwrap();
            register_event(&backends, execution_id, EventKind::NodeExecution, node_execution_data("router_1")).await.unwrap();
            register_event(&backends, execution_id, EventKind::NodeExecution, node_execution_data("tool_1")).await.unwrap();
            let ctx = backends.context.get_context(execution_id).await.unwrap();
            let operational = ctx.operational().unwrap();
            assert_eq!(operational.nodes.get("router_1"), Some(&2));
            assert_eq!(operational.nodes.get("tool_1"), Some(&1));
        });
    }
}
