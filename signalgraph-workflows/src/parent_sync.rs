//! ABOUTME: Propagates signals and context updates from a child execution to its parent
//! ABOUTME: Ported from parent_sync.py; sync_context_to_parent recurses across nesting levels

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use signalgraph_core::backend::Backends;
use signalgraph_core::context::Context;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;

/// The subset of `signals` this execution's `__parent__` metadata says
/// should be forwarded up, and the parent execution to forward them to.
pub fn get_signals_for_parent(signals: &[String], context: &Context) -> (Option<ExecutionId>, Vec<String>) {
    let Some(parent_link) = context.parent_link() else {
        return (None, Vec::new());
    };

    let matching: Vec<String> = signals
        .iter()
        .filter(|s| parent_link.signals_to_parent.contains(s))
        .cloned()
        .collect();

    (Some(parent_link.parent_execution_id), matching)
}

fn should_sync_key(context: &Context, key: &str) -> Option<ExecutionId> {
    let parent_link = context.parent_link()?;
    parent_link.context_updates_to_parent.contains(&key.to_string()).then_some(parent_link.parent_execution_id)
}

/// Propagate `updated_keys` up to the parent execution for every key
/// configured in `context_updates_to_parent`, extending the parent's
/// history list (or initializing it) with the child's entries, then
/// recursing one level further up so a multi-level nesting chain
/// propagates all the way to the root.
pub fn sync_context_to_parent<'a>(backends: &'a Backends, context: &'a Context, updated_keys: Vec<String>) -> BoxFuture<'a, Result<()>> {
    async move {
        for key in updated_keys {
            let Some(parent_id) = should_sync_key(context, &key) else {
                continue;
            };

            let mut parent_context = backends.context.get_context(parent_id).await?;
            let child_history = context.get(&key).cloned().unwrap_or(Value::Null);

            match (parent_context.get(&key).cloned(), &child_history) {
                (Some(Value::Array(mut parent_items)), Value::Array(child_items)) => {
                    parent_items.extend(child_items.clone());
                    parent_context.insert(key.clone(), Value::Array(parent_items));
                }
                _ => {
                    parent_context.insert(key.clone(), child_history);
                }
            }

            backends.context.save_context(parent_id, parent_context.clone()).await?;
            sync_context_to_parent(backends, &parent_context, vec![key]).await?;
        }
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use signalgraph_core::context::ParentLink;

    #[test]
    fn get_signals_for_parent_filters_to_configured_set() {
        let mut ctx = Context::new();
        ctx.set_parent_link(&ParentLink {
            parent_execution_id: ExecutionId::new(),
            signals_to_parent: vec!["DONE".into()],
            context_updates_to_parent: vec![],
            main_execution_id: ExecutionId::new(),
        });
        let (parent_id, signals) = get_signals_for_parent(&["DONE".to_string(), "OTHER".to_string()], &ctx);
        assert!(parent_id.is_some());
        assert_eq!(signals, vec!["DONE".to_string()]);
    }

    #[test]
    fn get_signals_for_parent_empty_without_link() {
        let ctx = Context::new();
        let (parent_id, signals) = get_signals_for_parent(&["DONE".to_string()], &ctx);
        assert!(parent_id.is_none());
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn sync_context_to_parent_initializes_missing_key() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let parent_id = ExecutionId::new();
        backends.context.save_context(parent_id, Context::new()).await.unwrap();

        let mut child_context = Context::new();
        child_context.insert("summary".to_string(), json!(["a", "b"]));
        child_context.set_parent_link(&ParentLink {
            parent_execution_id: parent_id,
            signals_to_parent: vec![],
            context_updates_to_parent: vec!["summary".into()],
            main_execution_id: parent_id,
        });

        sync_context_to_parent(&backends, &child_context, vec!["summary".to_string()]).await.unwrap();

        let parent_context = backends.context.get_context(parent_id).await.unwrap();
        assert_eq!(parent_context.get("summary"), Some(&json!(["a", "b"])));
    }

    #[tokio::test]
    async fn sync_context_to_parent_extends_existing_list() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let parent_id = ExecutionId::new();
        let mut parent_context = Context::new();
        parent_context.insert("summary".to_string(), json!(["a"]));
        backends.context.save_context(parent_id, parent_context).await.unwrap();

        let mut child_context = Context::new();
        child_context.insert("summary".to_string(), json!(["b"]));
        child_context.set_parent_link(&ParentLink {
            parent_execution_id: parent_id,
            signals_to_parent: vec![],
            context_updates_to_parent: vec!["summary".into()],
            main_execution_id: parent_id,
        });

        sync_context_to_parent(&backends, &child_context, vec!["summary".to_string()]).await.unwrap();

        let parent_context = backends.context.get_context(parent_id).await.unwrap();
        assert_eq!(parent_context.get("summary"), Some(&json!(["a", "b"])));
    }
}
