//! ABOUTME: In-memory reference backends and their factory
//! ABOUTME: The only backends this crate ships; spec explicitly excludes file-based persistence

mod context;
mod conversation_history;
mod identity;
mod schema;
mod telemetry;
mod workflow;

pub use context::InMemoryContextBackend;
pub use conversation_history::InMemoryConversationHistoryBackend;
pub use identity::InMemoryIdentityBackend;
pub use schema::InMemoryContextSchemaBackend;
pub use telemetry::InMemoryTelemetryBackend;
pub use workflow::InMemoryWorkflowBackend;

use std::sync::Arc;

use signalgraph_core::backend::Backends;

/// Build a fully-populated set of in-memory backends — every optional
/// seam filled in. Tests and the CLI's default run mode both use this;
/// a deployment wanting a leaner footprint can instead construct
/// [`Backends`] directly with only `context`/`workflow` set.
pub fn create_in_memory_backends() -> Backends {
    Backends {
        context: Arc::new(InMemoryContextBackend::new()),
        workflow: Arc::new(InMemoryWorkflowBackend::new()),
        telemetry: Some(Arc::new(InMemoryTelemetryBackend::new())),
        conversation_history: Some(Arc::new(InMemoryConversationHistoryBackend::new())),
        context_schema: Some(Arc::new(InMemoryContextSchemaBackend::new())),
        identity: Some(Arc::new(InMemoryIdentityBackend::new())),
    }
}
