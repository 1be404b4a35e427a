//! ABOUTME: In-memory context backend
//! ABOUTME: Dumb storage only — deep-copies on save, clones on read

use async_trait::async_trait;
use dashmap::DashMap;
use signalgraph_core::backend::ContextBackend;
use signalgraph_core::context::Context;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;

#[derive(Debug, Default)]
pub struct InMemoryContextBackend {
    storage: DashMap<ExecutionId, Context>,
}

impl InMemoryContextBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextBackend for InMemoryContextBackend {
    async fn get_context(&self, execution_id: ExecutionId) -> Result<Context> {
        Ok(self.storage.get(&execution_id).map(|entry| entry.value().clone()).unwrap_or_default())
    }

    async fn save_context(&self, execution_id: ExecutionId, context: Context) -> Result<()> {
        self.storage.insert(execution_id, context);
        Ok(())
    }

    async fn cleanup_all(&self) -> Result<()> {
        self.storage.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_execution_returns_empty_context() {
        let backend = InMemoryContextBackend::new();
        let ctx = backend.get_context(ExecutionId::new()).await.unwrap();
        assert!(ctx.0.is_empty());
    }

    #[tokio::test]
    async fn save_then_mutate_does_not_perturb_stored_copy() {
        let backend = InMemoryContextBackend::new();
        let id = ExecutionId::new();
        let mut ctx = Context::new();
        signalgraph_core::context::set_field(&mut ctx, "x", serde_json::json!(1));
        backend.save_context(id, ctx.clone()).await.unwrap();

        signalgraph_core::context::set_field(&mut ctx, "x", serde_json::json!(2));

        let stored = backend.get_context(id).await.unwrap();
        assert_eq!(signalgraph_core::context::get_field(&stored, "x"), Some(serde_json::json!(1)));
    }
}
