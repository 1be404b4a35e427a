//! ABOUTME: In-memory context schema backend
//! ABOUTME: Keyed by main_execution_id so children can see a parent's schema

use async_trait::async_trait;
use dashmap::DashMap;
use signalgraph_core::backend::ContextSchemaBackend;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::schema::ContextSchema;

#[derive(Debug, Default)]
pub struct InMemoryContextSchemaBackend {
    schemas: DashMap<ExecutionId, ContextSchema>,
}

impl InMemoryContextSchemaBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextSchemaBackend for InMemoryContextSchemaBackend {
    async fn save_context_schema(&self, execution_id: ExecutionId, schema: ContextSchema) -> Result<()> {
        self.schemas.insert(execution_id, schema);
        Ok(())
    }

    async fn get_context_schema(&self, execution_id: ExecutionId) -> Result<Option<ContextSchema>> {
        Ok(self.schemas.get(&execution_id).map(|entry| entry.value().clone()))
    }

    async fn delete_context_schema(&self, execution_id: ExecutionId) -> Result<bool> {
        Ok(self.schemas.remove(&execution_id).is_some())
    }

    async fn cleanup_all(&self) -> Result<()> {
        self.schemas.clear();
        Ok(())
    }
}
