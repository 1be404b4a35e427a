//! ABOUTME: Shared context-write helper used by every node executor
//! ABOUTME: Ported from nodes/lib/context.py's save_output_to_context

use serde_json::Value;
use signalgraph_core::backend::Backends;
use signalgraph_core::context::{set_field, Context};
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;

use crate::parent_sync::sync_context_to_parent;

/// Save a node's output to its configured `output_field`, then
/// propagate the update to the parent execution if configured. A
/// missing `output_field` or a `null` output is a no-op — an
/// unconfigured output field just means the node doesn't write
/// anything.
pub async fn save_output_to_context(backends: &Backends, execution_id: ExecutionId, output_field: Option<&str>, output_value: Value) -> Result<()> {
    let Some(field) = output_field else {
        return Ok(());
    };
    if output_value.is_null() {
        return Ok(());
    }

    let mut context = backends.context.get_context(execution_id).await?;
    set_field(&mut context, field, output_value);
    backends.context.save_context(execution_id, context.clone()).await?;
    sync_context_to_parent(backends, &context, vec![field.to_string()]).await?;
    Ok(())
}

/// Build the "unwrapped" render context (current value per public
/// field, raw value per internal field) that prompt/condition
/// templates render against.
pub fn unwrap_context(context: &Context) -> serde_json::Map<String, Value> {
    let mut unwrapped = serde_json::Map::new();
    for key in context.keys() {
        if Context::is_internal_field(key) {
            unwrapped.insert(key.clone(), context.get(key).cloned().unwrap_or(Value::Null));
        } else if let Some(value) = signalgraph_core::context::get_field(context, key) {
            unwrapped.insert(key.clone(), value);
        }
    }
    unwrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn no_op_without_output_field() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();
        save_output_to_context(&backends, id, None, json!("ignored")).await.unwrap();
        let context = backends.context.get_context(id).await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn writes_and_wraps_output_field() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        backends.context.save_context(id, Context::new()).await.unwrap();
        save_output_to_context(&backends, id, Some("result"), json!("ok")).await.unwrap();
        let context = backends.context.get_context(id).await.unwrap();
        assert_eq!(context.get("result"), Some(&json!(["ok"])));
    }
}
