//! ABOUTME: Telemetry event types recorded by register_event
//! ABOUTME: EventKind enumerates every event the engine emits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ExecutionId;

/// Every distinct kind of event the engine emits. A [`TelemetryBackend`]
/// records all of them verbatim; [`crate::context::Operational`]'s
/// counters only react to the subset named in its doc comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    OrchestrationStart,
    ConfigInheritanceStart,
    SignalsBroadcast,
    SignalsToParent,
    NodeExecution,
    NodeError,
    LlmCall,
    ToolCall,
    AgentToolCall,
    AgentToolResult,
    AgentToolNotFound,
    AgentToolsLoaded,
    ContextWarning,
}

/// A single telemetry record, as handed to a [`crate::backend::TelemetryBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub execution_id: ExecutionId,
    pub event_type: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}
