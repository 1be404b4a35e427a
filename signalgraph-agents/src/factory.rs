//! ABOUTME: The agent node executor: Router -> (Tool | Response) loop
//! ABOUTME: Ported from agent/factory.py and agent/lib/loop_handlers.py

use async_trait::async_trait;
use serde_json::json;
use signalgraph_core::error::{Result, WorkflowError};
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::EventKind;
use signalgraph_core::workflow::NodeConfig;

use signalgraph_workflows::broadcaster::{AgentNodeExecutor, Engine};
use signalgraph_workflows::context_io::save_output_to_context;
use signalgraph_workflows::conversation_io::get_conversation_history;
use signalgraph_workflows::nodes::llm::{output_schema_for, signal_options_for};
use signalgraph_workflows::signals::{emit_completion_signals, handle_llm_failure};

use crate::loop_state::AgentLoopState;
use crate::prompts::state_instructions;
use crate::stages::{execute_parameter_stage, execute_response_stage, execute_router_stage, RouterAction};
use crate::state::prepare_agent_context;
use crate::tools::{build_tools_signature, register_tools_loaded_event, AgentToolRegistry};

const RESULT_PREVIEW_LIMIT: usize = 1000;

/// The default [`AgentNodeExecutor`]: runs the Router/Parameter/Response
/// loop against a fixed [`AgentToolRegistry`].
#[derive(Debug, Clone)]
pub struct SignalgraphAgentExecutor {
    pub tools: AgentToolRegistry,
}

impl SignalgraphAgentExecutor {
    pub fn new(tools: AgentToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl AgentNodeExecutor for SignalgraphAgentExecutor {
    async fn execute(&self, engine: &Engine, execution_id: ExecutionId, node_config: &NodeConfig) -> Result<Vec<String>> {
        let NodeConfig::Agent { prompt, output_field, retries, event_emissions, tools: tool_names, identity, llm_failure_signal, .. } = node_config
        else {
            return Err(WorkflowError::Validation("SignalgraphAgentExecutor called with a non-agent node config".into()));
        };

        let backends = &engine.backends;
        let llm_caller = engine.llm_caller.as_ref();
        let node_config_value = serde_json::to_value(node_config).unwrap_or(json!({}));

        signalgraph_events::register_event(backends, execution_id, EventKind::LlmCall, json!({"stage": "router"})).await?;

        let (history_key, _) = get_conversation_history(execution_id, identity.as_deref(), backends).await?;
        let mut loop_state = AgentLoopState::create(history_key.map(|id| id.to_string()), backends, *retries).await?;

        let context = backends.context.get_context(execution_id).await?;
        let main_execution_id = context.operational().map(|op| op.main_execution_id).unwrap_or(execution_id);

        let tools_signature = build_tools_signature(tool_names, &self.tools);
        register_tools_loaded_event(backends, execution_id, "agent", tool_names, &self.tools).await?;

        while loop_state.can_retry() {
            let context = backends.context.get_context(execution_id).await?;
            let agent_context = prepare_agent_context(&context, prompt, &loop_state.tool_responses);
            let instructions = state_instructions(loop_state.execution_state());
            let conversation_history_str = loop_state.context_for_llm();

            let decision = execute_router_stage(
                llm_caller,
                &instructions,
                &agent_context.agent_prompt,
                &agent_context.context_string,
                &tools_signature,
                &conversation_history_str,
                &node_config_value,
                *retries,
            )
            .await?;

            match decision.action {
                RouterAction::Finish => {
                    let signal_options = signal_options_for(event_emissions);
                    let output_schema = output_schema_for(backends, main_execution_id, output_field.as_deref()).await?;

                    let final_response = execute_response_stage(
                        llm_caller,
                        &agent_context.agent_prompt,
                        &agent_context.context_string,
                        &conversation_history_str,
                        &node_config_value,
                        output_field.as_deref(),
                        output_schema.as_ref(),
                        &signal_options,
                        *retries,
                    )
                    .await?;

                    save_output_to_context(backends, execution_id, output_field.as_deref(), final_response.output.clone()).await?;

                    let context_after_save = backends.context.get_context(execution_id).await?;
                    return emit_completion_signals(final_response.selected_signal.as_deref(), event_emissions, &context_after_save);
                }
                RouterAction::CallTool => {
                    self.handle_tool_call(
                        backends,
                        execution_id,
                        decision.tool_name.as_deref(),
                        &agent_context.agent_prompt,
                        &agent_context.context_string,
                        &conversation_history_str,
                        &node_config_value,
                        *retries,
                        llm_caller,
                        &mut loop_state,
                    )
                    .await?;
                }
            }
        }

        let mut error_msg = format!("Agent execution exceeded max retries ({}).", loop_state.max_retries);
        if let Some(last) = loop_state.errors.last() {
            error_msg.push_str(&format!(" Last error: {last}"));
        }

        handle_llm_failure(backends, execution_id, "agent", &error_msg, llm_failure_signal.as_deref()).await
    }
}

impl SignalgraphAgentExecutor {
    #[allow(clippy::too_many_arguments)]
    async fn handle_tool_call(
        &self,
        backends: &signalgraph_core::backend::Backends,
        execution_id: ExecutionId,
        tool_name: Option<&str>,
        task_description: &str,
        context_string: &str,
        conversation_history: &str,
        node_config_value: &serde_json::Value,
        max_retries: u32,
        llm_caller: &dyn signalgraph_providers::LlmCaller,
        loop_state: &mut AgentLoopState,
    ) -> Result<()> {
        let Some(tool_name) = tool_name else {
            loop_state.add_system_error(backends, "Router chose 'call_tool' with no tool_name").await?;
            return Ok(());
        };

        let Some(spec) = self.tools.get(tool_name) else {
            signalgraph_events::register_event(
                backends,
                execution_id,
                EventKind::AgentToolNotFound,
                json!({"tool_name": tool_name, "available_tools": self.tools.keys().collect::<Vec<_>>()}),
            )
            .await?;
            loop_state.add_system_error(backends, &format!("Tool '{tool_name}' not found or not available.")).await?;
            return Ok(());
        };

        let tool_args = match execute_parameter_stage(
            llm_caller,
            task_description,
            context_string,
            tool_name,
            conversation_history,
            node_config_value,
            &spec.parameters_schema,
            max_retries,
        )
        .await
        {
            Ok(args) => args,
            Err(e) => {
                loop_state.add_tool_error(backends, tool_name, &e.to_string()).await?;
                return Ok(());
            }
        };

        signalgraph_events::register_event(
            backends,
            execution_id,
            EventKind::AgentToolCall,
            json!({"tool_name": tool_name, "tool_args": tool_args}),
        )
        .await?;

        let mut last_error = None;
        let mut result = None;
        for attempt in 0..=spec.max_retries {
            match (spec.function)(tool_args.clone()).await {
                Ok(value) => {
                    result = Some(value);
                    break;
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < spec.max_retries {
                        continue;
                    }
                }
            }
        }

        match result {
            Some(value) => {
                let result_str = value.to_string();
                let preview: String = result_str.chars().take(RESULT_PREVIEW_LIMIT).collect();
                let preview = if result_str.chars().count() > RESULT_PREVIEW_LIMIT { format!("{preview}...") } else { preview };

                signalgraph_events::register_event(
                    backends,
                    execution_id,
                    EventKind::AgentToolResult,
                    json!({"tool_name": tool_name, "result_preview": preview, "result_length": result_str.chars().count()}),
                )
                .await?;

                loop_state.add_tool_response(backends, tool_name, value).await?;
            }
            None => {
                loop_state.add_tool_error(backends, tool_name, &last_error.unwrap_or_else(|| "tool call failed".to_string())).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::FutureExt;
    use serde_json::json as j;
    use signalgraph_core::context::Context;
    use signalgraph_core::workflow::EventEmission;
    use signalgraph_providers::{EchoCaller, ScriptedCaller};
    use std::sync::Arc;

    fn agent_node_config() -> NodeConfig {
        NodeConfig::Agent {
            event_triggers: vec!["START".into()],
            prompt: "Find the capital of France".into(),
            output_field: Some("answer".into()),
            retries: 3,
            event_emissions: vec![EventEmission { signal_name: "DONE".into(), condition: None }],
            tools: vec!["lookup".into()],
            identity: None,
            llm_failure_signal: None,
        }
    }

    fn tools_with_lookup() -> AgentToolRegistry {
        let mut registry = AgentToolRegistry::new();
        registry.insert(
            "lookup".to_string(),
            crate::tools::AgentToolSpec {
                function: Arc::new(|_v| async move { Ok(j!({"capital": "Paris"})) }.boxed()),
                max_retries: 0,
                signature: "lookup(query: str)\n  Looks up a fact.".into(),
                parameters_schema: j!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
            },
        );
        registry
    }

    #[tokio::test]
    async fn finishes_directly_when_router_chooses_finish() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        let mut ctx = Context::new();
        signalgraph_core::context::add_operational_state(id, &mut ctx);
        backends.context.save_context(id, ctx).await.unwrap();

        let caller = EchoCaller { response: r#"{"answer": "Paris", "selected_signal": "DONE"}"#.into() };
        let executor = SignalgraphAgentExecutor::new(tools_with_lookup());
        let engine = Engine::new(backends.clone(), Default::default(), Arc::new(caller));

        let config = agent_node_config();
        let signals = executor.execute(&engine, id, &config).await.unwrap();
        assert_eq!(signals, vec!["DONE".to_string()]);

        let context = backends.context.get_context(id).await.unwrap();
        assert_eq!(context.get("answer"), Some(&j!(["Paris"])));
    }

    #[tokio::test]
    async fn calls_a_tool_then_finishes() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        let mut ctx = Context::new();
        signalgraph_core::context::add_operational_state(id, &mut ctx);
        backends.context.save_context(id, ctx).await.unwrap();

        let caller = ScriptedCaller::new(vec![
            r#"{"action": "call_tool", "tool_name": "lookup"}"#.to_string(),
            r#"{"query": "capital of France"}"#.to_string(),
            r#"{"action": "finish"}"#.to_string(),
            r#"{"answer": "Paris"}"#.to_string(),
        ]);

        let executor = SignalgraphAgentExecutor::new(tools_with_lookup());
        let engine = Engine::new(backends.clone(), Default::default(), Arc::new(caller));

        let config = agent_node_config();
        let signals = executor.execute(&engine, id, &config).await.unwrap();
        assert!(signals.is_empty());

        let context = backends.context.get_context(id).await.unwrap();
        assert_eq!(context.get("answer"), Some(&j!(["Paris"])));
    }

    #[tokio::test]
    async fn unknown_tool_name_records_system_error_and_retries() {
        let backends = signalgraph_storage::create_in_memory_backends();
        let id = ExecutionId::new();
        let mut ctx = Context::new();
        signalgraph_core::context::add_operational_state(id, &mut ctx);
        backends.context.save_context(id, ctx).await.unwrap();

        let caller = ScriptedCaller::new(vec![
            r#"{"action": "call_tool", "tool_name": "ghost"}"#.to_string(),
            r#"{"action": "finish"}"#.to_string(),
            r#"{"answer": "fallback"}"#.to_string(),
        ]);

        let mut config = agent_node_config();
        if let NodeConfig::Agent { retries, .. } = &mut config {
            *retries = 2;
        }

        let executor = SignalgraphAgentExecutor::new(AgentToolRegistry::new());
        let engine = Engine::new(backends.clone(), Default::default(), Arc::new(caller));

        let signals = executor.execute(&engine, id, &config).await.unwrap();
        assert!(signals.is_empty());
    }
}
