//! ABOUTME: The per-execution context document and its field history rules
//! ABOUTME: History-aware public fields plus the reserved __operational__/__parent__ structures
//!
//! Public fields are stored as append-only JSON arrays so that every
//! write is visible in `get_accumulated`; internal fields (any key
//! starting with `__`) are stored as a single raw value. This mirrors
//! `context_fields.py` and `operational.py` field-for-field rather than
//! modeling the two kinds of field as a Rust enum, since the context is
//! serialized as one flat JSON document by every backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ExecutionId;

pub const OPERATIONAL_KEY: &str = "__operational__";
pub const PARENT_KEY: &str = "__parent__";

/// A workflow execution's data, keyed by field name.
///
/// Deref's to the underlying [`serde_json::Map`] for callers that need
/// raw JSON access (e.g. a backend serializing the whole context), but
/// field reads/writes should go through [`set_field`]/[`get_field`]/
/// [`get_accumulated`] so the history-list invariant is preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(pub serde_json::Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self(serde_json::Map::new())
    }

    pub fn from_map(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn is_internal_field(field: &str) -> bool {
        field.starts_with("__")
    }

    /// Operational counters and signal log for this execution.
    pub fn operational(&self) -> Option<Operational> {
        self.0
            .get(OPERATIONAL_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_operational(&mut self, operational: &Operational) {
        self.0.insert(
            OPERATIONAL_KEY.to_string(),
            serde_json::to_value(operational).expect("Operational always serializes"),
        );
    }

    /// Metadata injected by a parent orchestration into a child's
    /// initial context, if this execution is a child.
    pub fn parent_link(&self) -> Option<ParentLink> {
        self.0
            .get(PARENT_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_parent_link(&mut self, link: &ParentLink) {
        self.0.insert(
            PARENT_KEY.to_string(),
            serde_json::to_value(link).expect("ParentLink always serializes"),
        );
    }
}

impl std::ops::Deref for Context {
    type Target = serde_json::Map<String, Value>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Context {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Set a context field, appending to its history list.
///
/// Internal fields (`__`-prefixed) are overwritten directly instead of
/// accumulated.
pub fn set_field(context: &mut Context, field: &str, value: Value) {
    if Context::is_internal_field(field) {
        context.0.insert(field.to_string(), value);
        return;
    }

    match context.0.get_mut(field) {
        Some(Value::Array(history)) => history.push(value),
        _ => {
            context.0.insert(field.to_string(), Value::Array(vec![value]));
        }
    }
}

/// Get a context field's current value (the last history entry).
pub fn get_field(context: &Context, field: &str) -> Option<Value> {
    if Context::is_internal_field(field) {
        return context.0.get(field).cloned();
    }

    match context.0.get(field) {
        Some(Value::Array(history)) => history.last().cloned(),
        Some(other) => Some(other.clone()),
        None => None,
    }
}

/// Get the full accumulated history for a field.
///
/// If the history has exactly one entry and that entry is itself a JSON
/// array, the array is returned unwrapped — this is the "initial
/// context passed a list for fan-out" case a `child` node's
/// `fan_out_field` relies on.
pub fn get_accumulated(context: &Context, field: &str) -> Vec<Value> {
    let Some(value) = context.0.get(field) else {
        return Vec::new();
    };

    match value {
        Value::Array(history) => {
            if let [Value::Array(inner)] = history.as_slice() {
                inner.clone()
            } else {
                history.clone()
            }
        }
        other => vec![other.clone()],
    }
}

/// Wrap every public field's current value in a single-element history
/// list. Skipped entirely if the context already carries a
/// [`PARENT_KEY`] entry, since `prepare_child_context` pre-wraps nothing
/// and child contexts are built directly from current values.
pub fn wrap_context_fields(context: serde_json::Map<String, Value>) -> Context {
    if context.contains_key(PARENT_KEY) {
        return Context::from_map(context);
    }

    let wrapped = context
        .into_iter()
        .map(|(k, v)| {
            if Context::is_internal_field(&k) {
                (k, v)
            } else {
                (k, Value::Array(vec![v]))
            }
        })
        .collect();

    Context::from_map(wrapped)
}

/// Add `__operational__` to a context if it doesn't already have one.
/// The new execution's `main_execution_id` is inherited from
/// `__parent__` when present, so telemetry counters for a whole
/// sub-orchestration tree can be attributed to the root execution.
pub fn add_operational_state(execution_id: ExecutionId, context: &mut Context) {
    if context.0.contains_key(OPERATIONAL_KEY) {
        return;
    }

    let main_execution_id = context
        .parent_link()
        .map(|p| p.main_execution_id)
        .unwrap_or(execution_id);

    context.set_operational(&Operational {
        signals: Vec::new(),
        nodes: HashMap::new(),
        llm_calls: 0,
        tool_calls: 0,
        errors: 0,
        main_execution_id,
    });
}

/// Runtime-tracking counters, updated exclusively through
/// `register_event` (see `signalgraph-events`). Testable properties
/// P2/P4 hold over this structure: counters only increase, and
/// `signals` is an append-only log with no deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operational {
    pub signals: Vec<String>,
    pub nodes: HashMap<String, u64>,
    pub llm_calls: u64,
    pub tool_calls: u64,
    pub errors: u64,
    pub main_execution_id: ExecutionId,
}

/// Metadata a `child` node injects into a sub-orchestration's initial
/// context so signals/context updates can flow back to the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent_execution_id: ExecutionId,
    #[serde(default)]
    pub signals_to_parent: Vec<String>,
    #[serde(default)]
    pub context_updates_to_parent: Vec<String>,
    pub main_execution_id: ExecutionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_field_accumulates_history() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "counter", Value::from(1));
        set_field(&mut ctx, "counter", Value::from(2));
        assert_eq!(get_field(&ctx, "counter"), Some(Value::from(2)));
        assert_eq!(get_accumulated(&ctx, "counter"), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn internal_fields_are_not_wrapped() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "__operational__", serde_json::json!({"x": 1}));
        set_field(&mut ctx, "__operational__", serde_json::json!({"x": 2}));
        assert_eq!(get_field(&ctx, "__operational__"), Some(serde_json::json!({"x": 2})));
    }

    #[test]
    fn get_accumulated_unwraps_single_list_entry() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "items", serde_json::json!(["a", "b", "c"]));
        assert_eq!(
            get_accumulated(&ctx, "items"),
            vec![Value::from("a"), Value::from("b"), Value::from("c")]
        );
    }

    #[test]
    fn get_accumulated_does_not_unwrap_after_second_write() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "items", serde_json::json!(["a", "b"]));
        set_field(&mut ctx, "items", serde_json::json!("c"));
        assert_eq!(
            get_accumulated(&ctx, "items"),
            vec![serde_json::json!(["a", "b"]), Value::from("c")]
        );
    }
}
