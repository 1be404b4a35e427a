//! ABOUTME: In-memory reference backends for the signalgraph workflow engine
//! ABOUTME: File-based/durable backends are out of scope; see DESIGN.md

pub mod memory;

pub use memory::{create_in_memory_backends, InMemoryContextBackend, InMemoryContextSchemaBackend, InMemoryConversationHistoryBackend, InMemoryIdentityBackend, InMemoryTelemetryBackend, InMemoryWorkflowBackend};
