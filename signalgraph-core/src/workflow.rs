//! ABOUTME: Declarative workflow document types
//! ABOUTME: Nodes wired together by signal names, tagged by node_type

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single node's declared signal emission: a name, and an optional
/// Jinja condition/description string.
///
/// `condition` is dual-purpose, exactly as in the node executors: a
/// plain-text string is a human-readable description used when an LLM
/// is asked to pick which signal to emit, while a string containing
/// `{{ ... }}` is a Jinja expression evaluated against the node's
/// render context to decide whether the signal fires at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEmission {
    pub signal_name: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl EventEmission {
    /// True if `condition` is a Jinja expression rather than plain text.
    pub fn is_jinja_condition(&self) -> bool {
        self.condition
            .as_deref()
            .map(has_jinja_markers)
            .unwrap_or(false)
    }
}

pub fn has_jinja_markers(s: &str) -> bool {
    s.contains("{{") && s.contains("}}")
}

fn default_retries() -> u32 {
    3
}

/// A node's static configuration, tagged by `node_type`.
///
/// One variant per node kind named in the engine: `router`, `tool`,
/// `llm`, `agent`, `child`. Each variant's fields are exactly the keys
/// its node-kind's config validator checks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeConfig {
    Router {
        event_triggers: Vec<String>,
        event_emissions: Vec<EventEmission>,
    },
    Tool {
        event_triggers: Vec<String>,
        tool_name: String,
        #[serde(default)]
        event_emissions: Vec<EventEmission>,
        #[serde(default)]
        output_field: Option<String>,
        #[serde(default)]
        context_parameter_field: Option<String>,
    },
    Llm {
        event_triggers: Vec<String>,
        prompt: String,
        #[serde(default)]
        output_field: Option<String>,
        #[serde(default = "default_retries")]
        retries: u32,
        #[serde(default)]
        event_emissions: Vec<EventEmission>,
        #[serde(default)]
        identity: Option<String>,
        #[serde(default)]
        llm_failure_signal: Option<String>,
    },
    Agent {
        event_triggers: Vec<String>,
        prompt: String,
        #[serde(default)]
        output_field: Option<String>,
        #[serde(default = "default_retries")]
        retries: u32,
        #[serde(default)]
        event_emissions: Vec<EventEmission>,
        #[serde(default)]
        tools: Vec<String>,
        #[serde(default)]
        identity: Option<String>,
        #[serde(default)]
        llm_failure_signal: Option<String>,
    },
    Child {
        child_workflow_name: String,
        child_initial_signals: Vec<String>,
        event_triggers: Vec<String>,
        #[serde(default)]
        signals_to_parent: Vec<String>,
        #[serde(default)]
        context_updates_to_parent: Vec<String>,
        #[serde(default)]
        input_fields: Vec<String>,
        #[serde(default)]
        fan_out_field: Option<String>,
        #[serde(default)]
        child_input_field: Option<String>,
        #[serde(default)]
        spawn_interval: f64,
        #[serde(default)]
        event_emissions: Vec<EventEmission>,
    },
}

impl NodeConfig {
    pub fn node_type(&self) -> &'static str {
        match self {
            NodeConfig::Router { .. } => "router",
            NodeConfig::Tool { .. } => "tool",
            NodeConfig::Llm { .. } => "llm",
            NodeConfig::Agent { .. } => "agent",
            NodeConfig::Child { .. } => "child",
        }
    }

    pub fn event_triggers(&self) -> &[String] {
        match self {
            NodeConfig::Router { event_triggers, .. }
            | NodeConfig::Tool { event_triggers, .. }
            | NodeConfig::Llm { event_triggers, .. }
            | NodeConfig::Agent { event_triggers, .. }
            | NodeConfig::Child { event_triggers, .. } => event_triggers,
        }
    }

    pub fn event_emissions(&self) -> &[EventEmission] {
        match self {
            NodeConfig::Router { event_emissions, .. }
            | NodeConfig::Tool { event_emissions, .. }
            | NodeConfig::Llm { event_emissions, .. }
            | NodeConfig::Agent { event_emissions, .. }
            | NodeConfig::Child { event_emissions, .. } => event_emissions,
        }
    }
}

/// A workflow is an ordered map of node name to config. Declaration
/// order is load-bearing: `broadcast_signals` iterates nodes in this
/// order when matching triggers, so re-running the same signals against
/// the same workflow must visit nodes in the same sequence every time
/// (testable property P5, determinism).
pub type Workflow = IndexMap<String, NodeConfig>;

/// `workflow_name -> Workflow`, as saved by the workflow backend for a
/// given execution.
pub type WorkflowsRegistry = IndexMap<String, Workflow>;
