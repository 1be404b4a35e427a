//! ABOUTME: Backend trait seams the engine is built against
//! ABOUTME: Context/Workflow backends are required, the rest are optional
//!
//! Every trait here is implemented once, in-memory, by
//! `signalgraph-storage`; the seam exists so a deployment can swap in a
//! durable store without touching the broadcaster or node executors.
//! `async_trait`, `Send + Sync + Debug` supertraits, `Result<_>` returns.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::identity::IdentitySet;
use crate::ids::ExecutionId;
use crate::schema::ContextSchema;
use crate::telemetry::{EventKind, TelemetryEvent};
use crate::workflow::WorkflowsRegistry;

/// Stores per-execution [`Context`] documents.
///
/// # Errors
///
/// Implementations return `Err` only for backend-level failures (I/O,
/// serialization); a missing execution id is represented as an empty
/// context, not an error, matching `InMemoryContextBackend.get_context`.
#[async_trait]
pub trait ContextBackend: Debug + Send + Sync {
    async fn get_context(&self, execution_id: ExecutionId) -> Result<Context>;

    /// Must deep-copy on write: callers mutate their own `Context` value
    /// after this call returns, and that mutation must not be visible
    /// to any other holder of a context for the same execution id.
    async fn save_context(&self, execution_id: ExecutionId, context: Context) -> Result<()>;

    async fn cleanup_all(&self) -> Result<()>;
}

/// Stores the workflows registry and the name of the currently active
/// workflow, per execution.
///
/// # Errors
///
/// As with [`ContextBackend`], only backend failures are `Err`; absent
/// entries come back as `None`/empty, matching the in-memory reference
/// implementation.
#[async_trait]
pub trait WorkflowBackend: Debug + Send + Sync {
    /// Must deep-copy on write — a caller that mutates a registry after
    /// passing it here must not perturb what's stored.
    async fn save_workflows_registry(&self, execution_id: ExecutionId, workflows: WorkflowsRegistry) -> Result<()>;

    /// Must deep-copy on read — see [`save_workflows_registry`].
    async fn get_workflows_registry(&self, execution_id: ExecutionId) -> Result<WorkflowsRegistry>;

    async fn save_current_workflow_name(&self, execution_id: ExecutionId, name: String) -> Result<()>;

    async fn get_current_workflow_name(&self, execution_id: ExecutionId) -> Result<Option<String>>;

    async fn cleanup_all(&self) -> Result<()>;
}

/// Optional telemetry sink. A deployment with no observability needs can
/// run with `backends.telemetry = None`; `register_event` treats that as
/// a no-op for the logging half of its job (the operational-counter half
/// always runs).
#[async_trait]
pub trait TelemetryBackend: Debug + Send + Sync {
    async fn log_event(&self, execution_id: ExecutionId, event_type: EventKind, data: serde_json::Value) -> Result<()>;

    async fn get_events(&self, execution_id: ExecutionId) -> Result<Vec<TelemetryEvent>>;

    async fn cleanup_all(&self) -> Result<()>;
}

/// Optional conversation history store, keyed by `main_execution_id` so
/// history persists across sub-orchestration boundaries.
#[async_trait]
pub trait ConversationHistoryBackend: Debug + Send + Sync {
    async fn get_conversation_history(&self, key: &str) -> Result<crate::conversation::ConversationHistory>;

    async fn append_to_conversation_history(&self, key: &str, entry: crate::conversation::ConversationEntry) -> Result<()>;

    /// Full-overwrite save, distinct from the incremental
    /// `append_to_conversation_history` — the `llm` node's
    /// `save_conversation_turn` uses this, while the `agent` node's
    /// `AgentLoopState` uses the append form for each intermediate turn.
    async fn save_conversation_history(&self, key: &str, history: crate::conversation::ConversationHistory) -> Result<()>;

    async fn delete_conversation_history(&self, key: &str) -> Result<bool>;

    async fn cleanup_all(&self) -> Result<()>;
}

/// Optional context-schema store, keyed by `main_execution_id`.
#[async_trait]
pub trait ContextSchemaBackend: Debug + Send + Sync {
    async fn save_context_schema(&self, execution_id: ExecutionId, schema: ContextSchema) -> Result<()>;

    async fn get_context_schema(&self, execution_id: ExecutionId) -> Result<Option<ContextSchema>>;

    async fn delete_context_schema(&self, execution_id: ExecutionId) -> Result<bool>;

    async fn cleanup_all(&self) -> Result<()>;
}

/// Optional identity store, keyed by `main_execution_id`.
#[async_trait]
pub trait IdentityBackend: Debug + Send + Sync {
    async fn save_identities(&self, execution_id: ExecutionId, identities: IdentitySet) -> Result<()>;

    async fn get_identities(&self, execution_id: ExecutionId) -> Result<Option<IdentitySet>>;

    async fn get_identity(&self, execution_id: ExecutionId, identity_name: &str) -> Result<Option<String>> {
        Ok(self
            .get_identities(execution_id)
            .await?
            .and_then(|identities| identities.get(identity_name).cloned()))
    }

    async fn delete_identities(&self, execution_id: ExecutionId) -> Result<bool>;

    async fn cleanup_all(&self) -> Result<()>;
}

/// The set of backend services passed to every node executor. Only
/// `context` and `workflow` are required; the rest are optional seams
/// (`Option<Arc<dyn _>>`) a deployment can leave unset.
#[derive(Clone)]
pub struct Backends {
    pub context: std::sync::Arc<dyn ContextBackend>,
    pub workflow: std::sync::Arc<dyn WorkflowBackend>,
    pub telemetry: Option<std::sync::Arc<dyn TelemetryBackend>>,
    pub conversation_history: Option<std::sync::Arc<dyn ConversationHistoryBackend>>,
    pub context_schema: Option<std::sync::Arc<dyn ContextSchemaBackend>>,
    pub identity: Option<std::sync::Arc<dyn IdentityBackend>>,
}

impl Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("context", &"<dyn ContextBackend>")
            .field("workflow", &"<dyn WorkflowBackend>")
            .field("telemetry", &self.telemetry.is_some())
            .field("conversation_history", &self.conversation_history.is_some())
            .field("context_schema", &self.context_schema.is_some())
            .field("identity", &self.identity.is_some())
            .finish()
    }
}

impl Backends {
    /// Clean all backend stores. Intended for test teardown.
    pub async fn cleanup_all(&self) -> Result<()> {
        self.context.cleanup_all().await?;
        self.workflow.cleanup_all().await?;
        if let Some(t) = &self.telemetry {
            t.cleanup_all().await?;
        }
        if let Some(c) = &self.conversation_history {
            c.cleanup_all().await?;
        }
        if let Some(s) = &self.context_schema {
            s.cleanup_all().await?;
        }
        if let Some(i) = &self.identity {
            i.cleanup_all().await?;
        }
        Ok(())
    }
}
