use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::dataset::DatasetItem;

// ===== Run Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running)
    }
}

// ===== Run Record =====

/// The persisted record of one evaluation execution. Created at run start,
/// mutated by the engine's own sequential progression, terminal once
/// `completed` or `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub dataset_id: Option<Uuid>,
    pub status: RunStatus,
    pub total_items: u64,
    pub processed_items: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metrics_config: serde_json::Value,
    pub summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EvaluationRun {
    pub fn new(
        evaluation_id: Uuid,
        dataset_id: Option<Uuid>,
        total_items: u64,
        metrics_config: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            evaluation_id,
            dataset_id,
            status: RunStatus::Pending,
            total_items,
            processed_items: 0,
            started_at: None,
            completed_at: None,
            metrics_config,
            summary: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// One persisted row per (run, dataset item, metric). Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResultRecord {
    pub id: Uuid,
    pub evaluation_run_id: Uuid,
    pub dataset_item_id: Uuid,
    pub metric_id: Uuid,
    pub score: f64,
    pub passed: bool,
    pub details: serde_json::Value,
    pub execution_time_ms: f64,
    pub created_at: DateTime<Utc>,
}

impl MetricResultRecord {
    pub fn new(
        evaluation_run_id: Uuid,
        dataset_item_id: Uuid,
        metric_id: Uuid,
        score: f64,
        passed: bool,
        details: serde_json::Value,
        execution_time_ms: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            evaluation_run_id,
            dataset_item_id,
            metric_id,
            score,
            passed,
            details,
            execution_time_ms,
            created_at: Utc::now(),
        }
    }
}

// ===== Run Configuration =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub mode: ExecutionMode,
    pub max_concurrency: usize,
    pub stop_on_first_failure: bool,
    pub timeout_ms: u64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_concurrency: 5,
            stop_on_first_failure: false,
            timeout_ms: 30_000,
        }
    }
}

/// Caller-supplied configuration for `start_evaluation_run`. Either a
/// dataset id or inline items must be present; that cross-field rule is
/// checked by the engine on top of the derive-level validation here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluationRunConfig {
    pub evaluation_id: Uuid,
    #[validate(length(min = 1, message = "at least one metric id is required"))]
    pub metric_ids: Vec<Uuid>,
    pub dataset_id: Option<Uuid>,
    pub dataset_items: Option<Vec<DatasetItem>>,
    #[serde(default)]
    pub options: ExecutionOptions,
}

impl EvaluationRunConfig {
    pub fn new(evaluation_id: Uuid, metric_ids: Vec<Uuid>) -> Self {
        Self {
            evaluation_id,
            metric_ids,
            dataset_id: None,
            dataset_items: None,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_dataset(mut self, dataset_id: Uuid) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    pub fn with_items(mut self, items: Vec<DatasetItem>) -> Self {
        self.dataset_items = Some(items);
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }
}

// ===== Progress =====

/// In-memory view of a running evaluation, served by `get_progress` and
/// pushed to subscribers. The persisted `EvaluationRun` is the system of
/// record; this exists only while the run is active plus a grace window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationProgress {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub total_items: u64,
    pub processed_items: u64,
    pub current_item_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

impl EvaluationProgress {
    pub fn new(run_id: Uuid, total_items: u64) -> Self {
        Self {
            run_id,
            status: RunStatus::Pending,
            total_items,
            processed_items: 0,
            current_item_id: None,
            started_at: Utc::now(),
            errors: Vec::new(),
        }
    }

    /// Snapshot reconstructed from the persisted record for runs that are no
    /// longer tracked in memory.
    pub fn from_run(run: &EvaluationRun) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            total_items: run.total_items,
            processed_items: run.processed_items,
            current_item_id: None,
            started_at: run.started_at.unwrap_or(run.created_at),
            errors: run.error_message.iter().cloned().collect(),
        }
    }
}

// ===== Summary =====

/// Per-metric aggregate over one run's persisted results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric_id: Uuid,
    pub evaluations: u64,
    pub passed: u64,
    pub average_score: f64,
    pub average_execution_time_ms: f64,
}

/// Aggregate statistics for a completed (or failed) run. An item counts as
/// passed iff every metric result recorded for it passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_items: u64,
    pub passed_items: u64,
    pub failed_items: u64,
    pub average_score: f64,
    pub total_execution_time_ms: f64,
    pub metrics: Vec<MetricSummary>,
}

/// Count/avg/min/max over a run's scores, as the external store would serve
/// them with a single aggregate query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ResultStats {
    pub count: u64,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}
