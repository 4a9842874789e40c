use async_trait::async_trait;
use dashmap::DashMap;
use llm_eval_core::{EvalError, EvaluationRun, MetricResultRecord, Result, ResultStats, RunStore};
use uuid::Uuid;

/// Run records plus their write-once result rows.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: DashMap<Uuid, EvaluationRun>,
    results: DashMap<Uuid, Vec<MetricResultRecord>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, run: &EvaluationRun) -> Result<()> {
        if self.runs.contains_key(&run.id) {
            return Err(EvalError::InvalidState(format!(
                "run {} already exists",
                run.id
            )));
        }
        self.runs.insert(run.id, run.clone());
        self.results.insert(run.id, Vec::new());
        Ok(())
    }

    async fn update_run(&self, run: &EvaluationRun) -> Result<()> {
        match self.runs.get_mut(&run.id) {
            Some(mut entry) => {
                *entry = run.clone();
                Ok(())
            }
            None => Err(EvalError::NotFound(format!("run {}", run.id))),
        }
    }

    async fn find_run(&self, id: &Uuid) -> Result<Option<EvaluationRun>> {
        Ok(self.runs.get(id).map(|run| run.clone()))
    }

    async fn increment_processed(&self, run_id: &Uuid) -> Result<u64> {
        match self.runs.get_mut(run_id) {
            Some(mut entry) => {
                entry.processed_items += 1;
                Ok(entry.processed_items)
            }
            None => Err(EvalError::NotFound(format!("run {}", run_id))),
        }
    }

    async fn insert_result(&self, record: &MetricResultRecord) -> Result<()> {
        self.results
            .entry(record.evaluation_run_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn results_for_run(&self, run_id: &Uuid) -> Result<Vec<MetricResultRecord>> {
        Ok(self
            .results
            .get(run_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }

    async fn result_stats(&self, run_id: &Uuid) -> Result<ResultStats> {
        let records = self.results_for_run(run_id).await?;
        if records.is_empty() {
            return Ok(ResultStats::default());
        }

        let count = records.len() as u64;
        let sum: f64 = records.iter().map(|r| r.score).sum();
        let min = records.iter().map(|r| r.score).fold(f64::INFINITY, f64::min);
        let max = records.iter().map(|r| r.score).fold(0.0, f64::max);

        Ok(ResultStats {
            count,
            average_score: sum / count as f64,
            min_score: min,
            max_score: max,
        })
    }
}
