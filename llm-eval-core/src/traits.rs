use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    DatasetItem, EvaluationDefinition, EvaluationRun, MetricDefinition, MetricResultRecord,
    ResultStats,
};
use crate::error::Result;

/// Read accessor for dataset items. The dataset itself is owned elsewhere.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load_items(&self, dataset_id: &Uuid) -> Result<Vec<DatasetItem>>;
}

/// Read accessor for evaluation definitions.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn find_evaluation(&self, id: &Uuid) -> Result<Option<EvaluationDefinition>>;
}

/// Read accessor for stored metric configurations.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn find_metric(&self, id: &Uuid) -> Result<Option<MetricDefinition>>;
}

/// Persistence for run records and per-(item, metric) result rows.
///
/// Result rows are write-once; the run row is only ever updated by the run's
/// own execution task, so implementations need no multi-writer coordination
/// beyond an atomic `increment_processed`.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &EvaluationRun) -> Result<()>;
    async fn update_run(&self, run: &EvaluationRun) -> Result<()>;
    async fn find_run(&self, id: &Uuid) -> Result<Option<EvaluationRun>>;
    async fn increment_processed(&self, run_id: &Uuid) -> Result<u64>;
    async fn insert_result(&self, record: &MetricResultRecord) -> Result<()>;
    async fn results_for_run(&self, run_id: &Uuid) -> Result<Vec<MetricResultRecord>>;
    async fn result_stats(&self, run_id: &Uuid) -> Result<ResultStats>;
}
