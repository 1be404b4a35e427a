//! ABOUTME: Builds a child execution's initial context from its parent
//! ABOUTME: Ported from child_context.py's prepare_child_context

use serde_json::Value;
use signalgraph_core::context::{get_field, Context, ParentLink};
use signalgraph_core::ids::ExecutionId;

/// Build a child execution's initial context: the current value (not
/// full history) of each configured `input_fields` entry, copied from
/// the parent, plus `__parent__` metadata for signal/context
/// propagation back up.
///
/// Pre-wraps each field into its one-entry history list itself, rather
/// than leaving bare scalars for `orchestrate()`'s later generic wrap
/// to lift, because [`signalgraph_core::context::wrap_context_fields`]
/// skips wrapping entirely once it sees `__parent__` already present,
/// so the wrapping has to happen here instead of being deferred.
pub fn prepare_child_context(
    parent_context: &Context,
    input_fields: &[String],
    signals_to_parent: &[String],
    context_updates_to_parent: &[String],
    parent_execution_id: ExecutionId,
    main_execution_id: ExecutionId,
) -> Context {
    let mut child_context = Context::new();

    for field_name in input_fields {
        if parent_context.contains_key(field_name) {
            if let Some(value) = get_field(parent_context, field_name) {
                child_context.insert(field_name.clone(), Value::Array(vec![value]));
            }
        }
    }

    child_context.set_parent_link(&ParentLink {
        parent_execution_id,
        signals_to_parent: signals_to_parent.to_vec(),
        context_updates_to_parent: context_updates_to_parent.to_vec(),
        main_execution_id,
    });

    child_context
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use signalgraph_core::context::set_field;

    #[test]
    fn copies_current_value_of_input_fields_only() {
        let mut parent = Context::new();
        set_field(&mut parent, "topic", json!("rust"));
        set_field(&mut parent, "topic", json!("async"));
        set_field(&mut parent, "unused", json!("ignored"));

        let child = prepare_child_context(&parent, &["topic".to_string()], &[], &[], ExecutionId::new(), ExecutionId::new());

        assert_eq!(child.get("topic"), Some(&json!(["async"])));
        assert!(!child.contains_key("unused"));
    }

    #[test]
    fn injects_parent_link_metadata() {
        let parent = Context::new();
        let parent_id = ExecutionId::new();
        let main_id = ExecutionId::new();
        let child = prepare_child_context(&parent, &[], &["DONE".to_string()], &["summary".to_string()], parent_id, main_id);

        let link = child.parent_link().unwrap();
        assert_eq!(link.parent_execution_id, parent_id);
        assert_eq!(link.signals_to_parent, vec!["DONE".to_string()]);
        assert_eq!(link.context_updates_to_parent, vec!["summary".to_string()]);
        assert_eq!(link.main_execution_id, main_id);
    }
}
