use async_trait::async_trait;
use dashmap::DashMap;
use llm_eval_core::{MetricDefinition, MetricStore, Result};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    metrics: DashMap<Uuid, MetricDefinition>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_metric(&self, definition: MetricDefinition) {
        self.metrics.insert(definition.id, definition);
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn find_metric(&self, id: &Uuid) -> Result<Option<MetricDefinition>> {
        Ok(self.metrics.get(id).map(|def| def.clone()))
    }
}
