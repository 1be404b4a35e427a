//! ABOUTME: In-memory workflow registry backend
//! ABOUTME: Deep-copies on both save and get so callers can't alias stored state

use async_trait::async_trait;
use dashmap::DashMap;
use signalgraph_core::backend::WorkflowBackend;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::workflow::WorkflowsRegistry;

#[derive(Debug, Default)]
pub struct InMemoryWorkflowBackend {
    registries: DashMap<ExecutionId, WorkflowsRegistry>,
    current_workflows: DashMap<ExecutionId, String>,
}

impl InMemoryWorkflowBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowBackend for InMemoryWorkflowBackend {
    async fn save_workflows_registry(&self, execution_id: ExecutionId, workflows: WorkflowsRegistry) -> Result<()> {
        self.registries.insert(execution_id, workflows);
        Ok(())
    }

    async fn get_workflows_registry(&self, execution_id: ExecutionId) -> Result<WorkflowsRegistry> {
        Ok(self.registries.get(&execution_id).map(|entry| entry.value().clone()).unwrap_or_default())
    }

    async fn save_current_workflow_name(&self, execution_id: ExecutionId, name: String) -> Result<()> {
        self.current_workflows.insert(execution_id, name);
        Ok(())
    }

    async fn get_current_workflow_name(&self, execution_id: ExecutionId) -> Result<Option<String>> {
        Ok(self.current_workflows.get(&execution_id).map(|entry| entry.value().clone()))
    }

    async fn cleanup_all(&self) -> Result<()> {
        self.registries.clear();
        self.current_workflows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[tokio::test]
    async fn get_returns_a_copy_not_a_reference() {
        let backend = InMemoryWorkflowBackend::new();
        let id = ExecutionId::new();
        let registry: WorkflowsRegistry = IndexMap::new();
        backend.save_workflows_registry(id, registry).await.unwrap();

        let mut fetched = backend.get_workflows_registry(id).await.unwrap();
        fetched.insert("mutated".into(), IndexMap::new());

        let again = backend.get_workflows_registry(id).await.unwrap();
        assert!(!again.contains_key("mutated"));
    }
}
