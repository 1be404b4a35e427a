//! ABOUTME: The tool registry node and agent executors call into
//! ABOUTME: Tools are registered closures, not reflected function signatures (see DESIGN.md)
//!
//! Rust has no runtime reflection over a closure's argument list, so a
//! registered tool here is an explicit [`ToolSpec`]: a boxed async
//! function taking one `serde_json::Value` plus the metadata
//! (`max_retries`, `failure_signal`, `process_accumulated`) a dynamic
//! language could otherwise read off the callable itself.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use signalgraph_core::context::{get_accumulated, get_field, Context};
use signalgraph_core::error::{Result, WorkflowError};

/// A tool function: takes its parameters as one JSON value, returns one
/// JSON value. A plain parameter object for most tools; the full
/// accumulated history array when `process_accumulated` is set.
pub type ToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone)]
pub struct ToolSpec {
    pub function: ToolFn,
    pub max_retries: u32,
    pub failure_signal: Option<String>,
    pub process_accumulated: bool,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("max_retries", &self.max_retries)
            .field("failure_signal", &self.failure_signal)
            .field("process_accumulated", &self.process_accumulated)
            .finish_non_exhaustive()
    }
}

impl ToolSpec {
    /// A tool with every default: zero retries, no failure signal, a
    /// plain (not accumulated) parameter object.
    pub fn simple<F, Fut>(function: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            function: Arc::new(move |v| Box::pin(function(v))),
            max_retries: 0,
            failure_signal: None,
            process_accumulated: false,
        }
    }
}

/// `tool_name -> ToolSpec`, populated by the embedding application at
/// startup. No builtin-tool fallback: self-modification builtin tools
/// (workflow/identity/schema mutation at runtime) are out of scope here
/// — see DESIGN.md.
pub type ToolRegistry = HashMap<String, ToolSpec>;

pub fn get_tool_from_registry(tool_name: &str, tools_registry: &ToolRegistry) -> Result<ToolSpec> {
    tools_registry
        .get(tool_name)
        .cloned()
        .ok_or_else(|| WorkflowError::Tool(format!("Tool '{tool_name}' not found in registry")))
}

/// Pull a tool node's parameters out of context, per
/// `extract_tool_parameters`: the current value of
/// `context_parameter_field`, or its full accumulated history when
/// `process_accumulated` is set. Returns an empty object when no field
/// is configured.
pub fn extract_tool_parameters(context: &Context, context_parameter_field: Option<&str>, process_accumulated: bool) -> Result<Value> {
    let Some(field) = context_parameter_field else {
        return Ok(Value::Object(serde_json::Map::new()));
    };

    if !context.contains_key(field) {
        return Err(WorkflowError::Tool(format!("Context missing required field: {field}")));
    }

    if process_accumulated {
        return Ok(Value::Array(get_accumulated(context, field)));
    }

    let parameters = get_field(context, field).unwrap_or(Value::Null);
    if !parameters.is_object() {
        return Err(WorkflowError::Tool(format!(
            "Context field '{field}' must be a dict of parameters, got {parameters}"
        )));
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use signalgraph_core::context::set_field;

    #[test]
    fn missing_field_is_empty_object() {
        let ctx = Context::new();
        let params = extract_tool_parameters(&ctx, None, false).unwrap();
        assert_eq!(params, json!({}));
    }

    #[test]
    fn non_object_field_errors() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "params", json!("not an object"));
        let err = extract_tool_parameters(&ctx, Some("params"), false).unwrap_err();
        assert!(err.to_string().contains("must be a dict"));
    }

    #[test]
    fn accumulated_returns_full_history() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "items", json!("a"));
        set_field(&mut ctx, "items", json!("b"));
        let params = extract_tool_parameters(&ctx, Some("items"), true).unwrap();
        assert_eq!(params, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn simple_tool_runs_through_the_registry() {
        let mut registry = ToolRegistry::new();
        registry.insert(
            "double".to_string(),
            ToolSpec::simple(|v: Value| async move { Ok(json!(v["x"].as_i64().unwrap_or(0) * 2)) }),
        );

        let spec = get_tool_from_registry("double", &registry).unwrap();
        let result = (spec.function)(json!({"x": 21})).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        assert!(get_tool_from_registry("missing", &registry).is_err());
    }
}
