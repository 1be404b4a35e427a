//! ABOUTME: The signal broadcaster: orchestrate() and broadcast_signals()
//! ABOUTME: Ported from broker.py; async self-recursion goes through BoxFuture
//!
//! `broadcast_signals` is reentrant: a node executor can, transitively,
//! cause more signals to be broadcast
//! before the outer call returns (a router firing a tool, a tool firing
//! another router, a child's signals-to-parent bubbling up). `async fn`
//! can't directly recurse into itself without boxing the resulting
//! future, so every recursive entry point here returns a
//! `BoxFuture` explicitly instead of being a plain `async fn`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use signalgraph_core::backend::Backends;
use signalgraph_core::context::{add_operational_state, get_accumulated};
use signalgraph_core::error::{Result, WorkflowError};
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::EventKind;
use signalgraph_core::validation::{validate_node_config, validate_operational};
use signalgraph_core::workflow::{NodeConfig, WorkflowsRegistry};

use signalgraph_events::{node_execution_data, register_event, signals_broadcast_data};
use signalgraph_providers::LlmCaller;
use tracing::{debug, info};

use crate::child_context::prepare_child_context;
use crate::inheritance::{inherit_config, inherit_context, prepare_initial_context};
use crate::nodes::{llm as llm_node, router as router_node, tool as tool_node};
use crate::parent_sync::get_signals_for_parent;
use crate::tools::ToolRegistry;

/// Executes an `agent` node. Lives behind a trait so `signalgraph-workflows`
/// doesn't have to depend on `signalgraph-agents` (which depends on this
/// crate for its node plumbing) — the embedding application wires a
/// concrete implementation into [`Engine::agent_executor`].
#[async_trait]
pub trait AgentNodeExecutor: std::fmt::Debug + Send + Sync {
    async fn execute(&self, engine: &Engine, execution_id: ExecutionId, node_config: &NodeConfig) -> Result<Vec<String>>;
}

/// The default recursion-depth guard for [`Engine::broadcast_signals`].
/// An additive safety net against a signal cycle with no terminating
/// condition; it changes no behavior for any workflow that terminates.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 64;

/// Bundles everything a running orchestration needs: storage, the tool
/// registry, the LLM calling seam, and (optionally) an agent executor.
#[derive(Clone)]
pub struct Engine {
    pub backends: Backends,
    pub tools: ToolRegistry,
    pub llm_caller: Arc<dyn LlmCaller>,
    pub agent_executor: Option<Arc<dyn AgentNodeExecutor>>,
    pub max_recursion_depth: usize,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("max_recursion_depth", &self.max_recursion_depth)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("has_agent_executor", &self.agent_executor.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(backends: Backends, tools: ToolRegistry, llm_caller: Arc<dyn LlmCaller>) -> Self {
        Self { backends, tools, llm_caller, agent_executor: None, max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH }
    }

    pub fn with_agent_executor(mut self, executor: Arc<dyn AgentNodeExecutor>) -> Self {
        self.agent_executor = Some(executor);
        self
    }

    /// Start a new execution: save the (possibly inherited) workflows
    /// registry and context, then broadcast the initial signals.
    /// Returns the new execution's id.
    #[allow(clippy::too_many_arguments)]
    pub fn orchestrate(
        &self,
        config: Option<WorkflowsRegistry>,
        initial_workflow_name: String,
        initial_signals: Vec<String>,
        initial_context: serde_json::Map<String, Value>,
        inherit_config_from_id: Option<ExecutionId>,
        inherit_context_from_id: Option<ExecutionId>,
    ) -> BoxFuture<'_, Result<ExecutionId>> {
        async move {
            if config.is_none() && inherit_config_from_id.is_none() {
                return Err(WorkflowError::Validation("either a config or an inherit_config_from_id must be provided".into()));
            }
            if initial_signals.is_empty() {
                return Err(WorkflowError::Validation("'initial_signals' must be a non-empty list".into()));
            }
            if initial_workflow_name.is_empty() {
                return Err(WorkflowError::Validation("'initial_workflow_name' must be a non-empty string".into()));
            }

            let id = ExecutionId::new();
            info!(execution_id = %id, workflow_name = %initial_workflow_name, "orchestrate: starting");

            let mut registry = WorkflowsRegistry::new();
            if let Some(source) = inherit_config_from_id {
                register_event(
                    &self.backends,
                    id,
                    EventKind::ConfigInheritanceStart,
                    serde_json::json!({"source_execution_id": source.to_string()}),
                )
                .await?;
                registry = inherit_config(&self.backends, source, id).await?;
            }

            if let Some(cfg) = config {
                for (workflow_name, workflow) in cfg.iter() {
                    if workflow.is_empty() {
                        return Err(WorkflowError::Validation(format!("workflow '{workflow_name}' is empty - at least one node is required")));
                    }
                    for (node_name, node_config) in workflow.iter() {
                        if node_name.starts_with("__") {
                            return Err(WorkflowError::Validation(format!(
                                "node name '{node_name}' in workflow '{workflow_name}' is reserved - node names may not start with '__'"
                            )));
                        }
                        validate_node_config(node_config)?;
                    }
                }
                registry = cfg;
            }

            register_event(&self.backends, id, EventKind::OrchestrationStart, serde_json::json!({"workflow_name": initial_workflow_name})).await?;
            self.backends.workflow.save_workflows_registry(id, registry.clone()).await?;

            if !registry.contains_key(&initial_workflow_name) {
                return Err(WorkflowError::Validation(format!("workflow '{initial_workflow_name}' not found in workflows registry")));
            }
            self.backends.workflow.save_current_workflow_name(id, initial_workflow_name).await?;

            let inherited_context = match inherit_context_from_id {
                Some(source) => Some(inherit_context(&self.backends, source).await?),
                None => None,
            };
            let mut context = prepare_initial_context(inherited_context, initial_context);
            add_operational_state(id, &mut context);
            self.backends.context.save_context(id, context).await?;

            self.broadcast_signals(id, initial_signals, 0).await?;
            info!(execution_id = %id, "orchestrate: completed");
            Ok(id)
        }
        .boxed()
    }

    /// Broadcast `signals` to every node in `id`'s current workflow
    /// whose `event_triggers` intersect them, then forward whichever of
    /// those signals are configured to propagate to a parent execution.
    pub fn broadcast_signals(&self, id: ExecutionId, signals: Vec<String>, depth: usize) -> BoxFuture<'_, Result<()>> {
        async move {
            if depth > self.max_recursion_depth {
                return Err(WorkflowError::RecursionLimit(self.max_recursion_depth));
            }
            debug!(execution_id = %id, ?signals, depth, "broadcast_signals: entry");

            let context = self.backends.context.get_context(id).await?;
            validate_operational(&context)?;

            register_event(&self.backends, id, EventKind::SignalsBroadcast, signals_broadcast_data(&signals)).await?;

            let registry = self.backends.workflow.get_workflows_registry(id).await?;
            let workflow_name = self
                .backends
                .workflow
                .get_current_workflow_name(id)
                .await?
                .ok_or_else(|| WorkflowError::Operational(format!("execution '{id}' has no current workflow set")))?;
            let workflow = registry.get(&workflow_name).cloned().unwrap_or_default();

            for (node_name, node_config) in &workflow {
                let triggered = node_config.event_triggers().iter().any(|t| signals.contains(t));
                if !triggered {
                    continue;
                }

                register_event(&self.backends, id, EventKind::NodeExecution, node_execution_data(node_name)).await?;
                debug!(execution_id = %id, node_name, "broadcast_signals: executing node");

                let emitted = self.execute_node(id, node_config).await?;
                if !emitted.is_empty() {
                    self.broadcast_signals(id, emitted, depth + 1).await?;
                }
            }

            let context = self.backends.context.get_context(id).await?;
            let (parent_id, signals_to_sync) = get_signals_for_parent(&signals, &context);

            if let Some(parent_id) = parent_id {
                if !signals_to_sync.is_empty() {
                    register_event(
                        &self.backends,
                        id,
                        EventKind::SignalsToParent,
                        serde_json::json!({"signals": signals_to_sync, "parent_id": parent_id.to_string()}),
                    )
                    .await?;
                    self.broadcast_signals(parent_id, signals_to_sync, depth + 1).await?;
                }
            }

            Ok(())
        }
        .boxed()
    }

    fn execute_node<'a>(&'a self, id: ExecutionId, node_config: &'a NodeConfig) -> BoxFuture<'a, Result<Vec<String>>> {
        async move {
            match node_config {
                NodeConfig::Router { event_emissions, .. } => {
                    let context = self.backends.context.get_context(id).await?;
                    router_node::execute_router_node(event_emissions, &context)
                }
                NodeConfig::Tool { tool_name, event_emissions, output_field, context_parameter_field, .. } => {
                    tool_node::execute_tool_node(
                        &self.backends,
                        &self.tools,
                        id,
                        tool_name,
                        context_parameter_field.as_deref(),
                        output_field.as_deref(),
                        event_emissions,
                    )
                    .await
                }
                NodeConfig::Llm { prompt, output_field, retries, event_emissions, identity, llm_failure_signal, .. } => {
                    let node_config_value = serde_json::to_value(node_config).unwrap_or(Value::Null);
                    llm_node::execute_llm_node(
                        &self.backends,
                        self.llm_caller.as_ref(),
                        id,
                        &node_config_value,
                        prompt,
                        identity.as_deref(),
                        output_field.as_deref(),
                        event_emissions,
                        *retries,
                        llm_failure_signal.as_deref(),
                    )
                    .await
                }
                NodeConfig::Agent { .. } => match &self.agent_executor {
                    Some(executor) => executor.execute(self, id, node_config).await,
                    None => Err(WorkflowError::NodeExecution("'agent' node configured but no agent executor was registered on this engine".into())),
                },
                NodeConfig::Child {
                    child_workflow_name,
                    child_initial_signals,
                    signals_to_parent,
                    context_updates_to_parent,
                    input_fields,
                    fan_out_field,
                    child_input_field,
                    spawn_interval,
                    ..
                } => {
                    self.execute_child_node(
                        id,
                        child_workflow_name,
                        child_initial_signals,
                        signals_to_parent,
                        context_updates_to_parent,
                        input_fields,
                        fan_out_field.as_deref(),
                        child_input_field.as_deref(),
                        *spawn_interval,
                    )
                    .await
                }
            }
        }
        .boxed()
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_child_node(
        &self,
        id: ExecutionId,
        child_workflow_name: &str,
        child_initial_signals: &[String],
        signals_to_parent: &[String],
        context_updates_to_parent: &[String],
        input_fields: &[String],
        fan_out_field: Option<&str>,
        child_input_field: Option<&str>,
        spawn_interval: f64,
    ) -> Result<Vec<String>> {
        debug!(execution_id = %id, child_workflow_name, "execute_child_node: entry");
        let context = self.backends.context.get_context(id).await?;
        let main_execution_id = context.operational().map(|op| op.main_execution_id).unwrap_or(id);
        let workflows_registry = self.backends.workflow.get_workflows_registry(id).await?;

        let base_child_context = prepare_child_context(&context, input_fields, signals_to_parent, context_updates_to_parent, id, main_execution_id);

        let fan_out_items = fan_out_field.map(|field| get_accumulated(&context, field)).unwrap_or_default();

        if !fan_out_items.is_empty() {
            if let Some(input_field) = child_input_field {
                for (i, item) in fan_out_items.into_iter().enumerate() {
                    let mut child_context = base_child_context.clone();
                    child_context.insert(input_field.to_string(), Value::Array(vec![item]));

                    if i > 0 && spawn_interval > 0.0 {
                        tokio::time::sleep(std::time::Duration::from_secs_f64(spawn_interval)).await;
                    }

                    self.orchestrate(
                        Some(workflows_registry.clone()),
                        child_workflow_name.to_string(),
                        child_initial_signals.to_vec(),
                        child_context.0,
                        None,
                        None,
                    )
                    .await?;
                }
                return Ok(Vec::new());
            }
        }

        self.orchestrate(Some(workflows_registry), child_workflow_name.to_string(), child_initial_signals.to_vec(), base_child_context.0, None, None)
            .await?;

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use signalgraph_core::workflow::{EventEmission, Workflow};
    use signalgraph_providers::EchoCaller;

    fn engine() -> Engine {
        let backends = signalgraph_storage::create_in_memory_backends();
        Engine::new(backends, ToolRegistry::new(), Arc::new(EchoCaller { response: r#"{"output": "ok"}"#.into() }))
    }

    #[tokio::test]
    async fn orchestrate_requires_config_or_inheritance() {
        let engine = engine();
        let err = engine.orchestrate(None, "main".into(), vec!["START".into()], serde_json::Map::new(), None, None).await.unwrap_err();
        assert!(err.to_string().contains("config"));
    }

    #[tokio::test]
    async fn orchestrate_runs_a_single_router_node() {
        let engine = engine();

        let mut workflow: Workflow = IndexMap::new();
        workflow.insert(
            "router".to_string(),
            NodeConfig::Router {
                event_triggers: vec!["START".into()],
                event_emissions: vec![EventEmission { signal_name: "DONE".into(), condition: None }],
            },
        );
        let mut registry = WorkflowsRegistry::new();
        registry.insert("main".to_string(), workflow);

        let id = engine.orchestrate(Some(registry), "main".into(), vec!["START".into()], serde_json::Map::new(), None, None).await.unwrap();

        let context = engine.backends.context.get_context(id).await.unwrap();
        let operational = context.operational().unwrap();
        assert!(operational.signals.contains(&"START".to_string()));
        assert!(operational.signals.contains(&"DONE".to_string()));
        assert_eq!(operational.nodes.get("router"), Some(&1));
    }

    #[tokio::test]
    async fn unknown_initial_workflow_errors() {
        let engine = engine();
        let registry = WorkflowsRegistry::new();
        let err = engine.orchestrate(Some(registry), "missing".into(), vec!["START".into()], serde_json::Map::new(), None, None).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
