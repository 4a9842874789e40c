use async_trait::async_trait;
use dashmap::DashMap;
use llm_eval_core::{DatasetItem, DatasetSource, EvalError, Result};
use uuid::Uuid;

/// Dataset items keyed by dataset id.
#[derive(Debug, Default)]
pub struct InMemoryDatasetSource {
    datasets: DashMap<Uuid, Vec<DatasetItem>>,
}

impl InMemoryDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&self, dataset_id: Uuid, items: Vec<DatasetItem>) {
        self.datasets.insert(dataset_id, items);
    }
}

#[async_trait]
impl DatasetSource for InMemoryDatasetSource {
    async fn load_items(&self, dataset_id: &Uuid) -> Result<Vec<DatasetItem>> {
        self.datasets
            .get(dataset_id)
            .map(|items| items.clone())
            .ok_or_else(|| EvalError::NotFound(format!("dataset {}", dataset_id)))
    }
}
