//! ABOUTME: The agent node: a three-stage Router/Parameter/Response LLM loop with tool calling
//! ABOUTME: Ported from nodes/agent/*; implements signalgraph_workflows::AgentNodeExecutor

pub mod factory;
pub mod loop_state;
pub mod prompts;
pub mod stages;
pub mod state;
pub mod tools;

pub use factory::SignalgraphAgentExecutor;
pub use tools::{AgentToolRegistry, AgentToolSpec};
