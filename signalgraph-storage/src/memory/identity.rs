//! ABOUTME: In-memory identity backend
//! ABOUTME: Keyed by main_execution_id; identity_name -> system_prompt

use async_trait::async_trait;
use dashmap::DashMap;
use signalgraph_core::backend::IdentityBackend;
use signalgraph_core::error::Result;
use signalgraph_core::identity::IdentitySet;
use signalgraph_core::ids::ExecutionId;

#[derive(Debug, Default)]
pub struct InMemoryIdentityBackend {
    identities: DashMap<ExecutionId, IdentitySet>,
}

impl InMemoryIdentityBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityBackend for InMemoryIdentityBackend {
    async fn save_identities(&self, execution_id: ExecutionId, identities: IdentitySet) -> Result<()> {
        self.identities.insert(execution_id, identities);
        Ok(())
    }

    async fn get_identities(&self, execution_id: ExecutionId) -> Result<Option<IdentitySet>> {
        Ok(self.identities.get(&execution_id).map(|entry| entry.value().clone()))
    }

    async fn delete_identities(&self, execution_id: ExecutionId) -> Result<bool> {
        Ok(self.identities.remove(&execution_id).is_some())
    }

    async fn cleanup_all(&self) -> Result<()> {
        self.identities.clear();
        Ok(())
    }
}
