//! ABOUTME: In-memory telemetry backend
//! ABOUTME: Dumb storage only — appends events per execution id

use async_trait::async_trait;
use dashmap::DashMap;
use signalgraph_core::backend::TelemetryBackend;
use signalgraph_core::error::Result;
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::telemetry::{EventKind, TelemetryEvent};

#[derive(Debug, Default)]
pub struct InMemoryTelemetryBackend {
    events: DashMap<ExecutionId, Vec<TelemetryEvent>>,
}

impl InMemoryTelemetryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TelemetryBackend for InMemoryTelemetryBackend {
    async fn log_event(&self, execution_id: ExecutionId, event_type: EventKind, data: serde_json::Value) -> Result<()> {
        self.events.entry(execution_id).or_default().push(TelemetryEvent {
            execution_id,
            event_type,
            timestamp: chrono::Utc::now(),
            data,
        });
        Ok(())
    }

    async fn get_events(&self, execution_id: ExecutionId) -> Result<Vec<TelemetryEvent>> {
        Ok(self.events.get(&execution_id).map(|entry| entry.value().clone()).unwrap_or_default())
    }

    async fn cleanup_all(&self) -> Result<()> {
        self.events.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_accumulate_per_execution() {
        let backend = InMemoryTelemetryBackend::new();
        let id = ExecutionId::new();
        backend.log_event(id, EventKind::NodeExecution, serde_json::json!({"node_name": "a"})).await.unwrap();
        backend.log_event(id, EventKind::LlmCall, serde_json::json!({})).await.unwrap();
        let events = backend.get_events(id).await.unwrap();
        assert_eq!(events.len(), 2);
    }
}
