use chrono::Utc;
use llm_eval_core::{
    DatasetItem, DatasetSource, EvalError, EvaluationContext, EvaluationProgress, EvaluationRun,
    EvaluationRunConfig, EvaluationStore, ExecutionMode, ExecutionOptions, MetricResult,
    MetricResultRecord, MetricStore, MetricSummary, Result, RunStatus, RunStore, RunSummary,
};
use llm_eval_metrics::{Metric, MetricFactory};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;
use validator::Validate;

use crate::progress::{ProgressCallback, ProgressTracker};

/// How long a terminal run's progress entry stays queryable before it is
/// discarded. The persisted run record remains the system of record.
const PROGRESS_RETENTION: Duration = Duration::from_secs(60);

/// A runtime metric paired with the id of its stored definition, which keys
/// the persisted result rows.
#[derive(Clone)]
struct ResolvedMetric {
    id: Uuid,
    metric: Arc<dyn Metric>,
}

/// Orchestrates evaluation runs: resolves metric instances through the
/// factory, executes them over the dataset items, persists every result row,
/// and tracks progress. Collaborators are injected so tests can supply
/// doubles; there is no process-wide singleton.
#[derive(Clone)]
pub struct EvaluationEngine {
    datasets: Arc<dyn DatasetSource>,
    evaluations: Arc<dyn EvaluationStore>,
    metric_store: Arc<dyn MetricStore>,
    runs: Arc<dyn RunStore>,
    factory: MetricFactory,
    tracker: Arc<ProgressTracker>,
}

impl EvaluationEngine {
    pub fn new(
        datasets: Arc<dyn DatasetSource>,
        evaluations: Arc<dyn EvaluationStore>,
        metric_store: Arc<dyn MetricStore>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            datasets,
            evaluations,
            metric_store,
            runs,
            factory: MetricFactory::new(),
            tracker: Arc::new(ProgressTracker::new()),
        }
    }

    // ===== Public operations =====

    /// Validate the run config, resolve everything it references, persist a
    /// pending run record, and launch execution without blocking the caller.
    /// Returns the run id immediately.
    pub async fn start_evaluation_run(&self, config: EvaluationRunConfig) -> Result<Uuid> {
        config.validate()?;

        let has_inline_items = config
            .dataset_items
            .as_ref()
            .map(|items| !items.is_empty())
            .unwrap_or(false);
        if config.dataset_id.is_none() && !has_inline_items {
            return Err(EvalError::Validation(
                "either a dataset id or inline dataset items are required".to_string(),
            ));
        }

        let evaluation = self
            .evaluations
            .find_evaluation(&config.evaluation_id)
            .await?
            .ok_or_else(|| {
                EvalError::NotFound(format!("evaluation {}", config.evaluation_id))
            })?;

        let metrics = self.resolve_metrics(&config.metric_ids).await?;
        let metrics_config = json!(metrics
            .iter()
            .map(|m| json!({ "id": m.id, "config": m.metric.config() }))
            .collect::<Vec<_>>());

        let items = match &config.dataset_items {
            Some(items) if !items.is_empty() => items.clone(),
            _ => {
                let dataset_id = config.dataset_id.as_ref().ok_or_else(|| {
                    EvalError::Validation("dataset id is required".to_string())
                })?;
                self.datasets.load_items(dataset_id).await?
            }
        };

        let run = EvaluationRun::new(
            evaluation.id,
            config.dataset_id,
            items.len() as u64,
            metrics_config,
        );
        self.runs.create_run(&run).await?;

        let mut progress = EvaluationProgress::new(run.id, run.total_items);
        progress.started_at = Utc::now();
        self.tracker.register(progress).await;

        tracing::info!(
            run_id = %run.id,
            evaluation = %evaluation.name,
            items = items.len(),
            metrics = metrics.len(),
            "starting evaluation run"
        );

        // Fire-and-forget; the execution task records its own failures and
        // never propagates out of the spawn.
        let engine = self.clone();
        let run_id = run.id;
        let options = config.options.clone();
        tokio::spawn(async move {
            engine.execute_run(run_id, items, metrics, options).await;
        });

        Ok(run_id)
    }

    /// Live progress if the run is active, else a snapshot reconstructed
    /// from the persisted record. None for unknown run ids.
    pub async fn get_progress(&self, run_id: &Uuid) -> Result<Option<EvaluationProgress>> {
        if let Some(progress) = self.tracker.get(run_id).await {
            return Ok(Some(progress));
        }
        Ok(self
            .runs
            .find_run(run_id)
            .await?
            .map(|run| EvaluationProgress::from_run(&run)))
    }

    /// Register the run's progress callback, replacing any previous one.
    pub async fn on_progress(&self, run_id: Uuid, callback: ProgressCallback) {
        self.tracker.set_callback(run_id, callback).await;
    }

    /// Snapshot stream of the run's progress, if it is still tracked.
    pub async fn subscribe(
        &self,
        run_id: &Uuid,
    ) -> Option<tokio::sync::watch::Receiver<EvaluationProgress>> {
        self.tracker.subscribe(run_id).await
    }

    /// Stop a running evaluation. Returns whether the stop had effect.
    pub async fn stop_evaluation(&self, run_id: &Uuid) -> Result<bool> {
        if !self.tracker.is_running(run_id).await {
            return Ok(false);
        }

        self.tracker
            .update(run_id, |progress| {
                progress.status = RunStatus::Failed;
                progress.errors.push("stopped by user".to_string());
            })
            .await;

        if let Some(mut run) = self.runs.find_run(run_id).await? {
            run.status = RunStatus::Failed;
            run.error_message = Some("Evaluation stopped by user".to_string());
            run.completed_at = Some(Utc::now());
            self.runs.update_run(&run).await?;
        }

        tracing::warn!(run_id = %run_id, "evaluation stopped by user");
        self.schedule_cleanup(*run_id);
        Ok(true)
    }

    /// Aggregate statistics over a run's persisted result rows. An item
    /// passes iff every metric result recorded for it passed.
    pub async fn get_evaluation_summary(&self, run_id: &Uuid) -> Result<RunSummary> {
        let run = self
            .runs
            .find_run(run_id)
            .await?
            .ok_or_else(|| EvalError::NotFound(format!("run {}", run_id)))?;
        let records = self.runs.results_for_run(run_id).await?;

        let mut item_passed: HashMap<Uuid, bool> = HashMap::new();
        let mut per_metric: HashMap<Uuid, (u64, u64, f64, f64)> = HashMap::new();
        let mut score_sum = 0.0;
        let mut execution_time_sum = 0.0;

        for record in &records {
            *item_passed.entry(record.dataset_item_id).or_insert(true) &= record.passed;

            let entry = per_metric.entry(record.metric_id).or_insert((0, 0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += u64::from(record.passed);
            entry.2 += record.score;
            entry.3 += record.execution_time_ms;

            score_sum += record.score;
            execution_time_sum += record.execution_time_ms;
        }

        let total_items = item_passed.len() as u64;
        let passed_items = item_passed.values().filter(|passed| **passed).count() as u64;

        let mut metrics: Vec<MetricSummary> = per_metric
            .into_iter()
            .map(|(metric_id, (evaluations, passed, scores, times))| MetricSummary {
                metric_id,
                evaluations,
                passed,
                average_score: scores / evaluations as f64,
                average_execution_time_ms: times / evaluations as f64,
            })
            .collect();
        metrics.sort_by_key(|summary| summary.metric_id);

        let total_execution_time_ms = match (run.started_at, run.completed_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64,
            _ => execution_time_sum,
        };

        Ok(RunSummary {
            run_id: *run_id,
            total_items,
            passed_items,
            failed_items: total_items - passed_items,
            average_score: if records.is_empty() {
                0.0
            } else {
                score_sum / records.len() as f64
            },
            total_execution_time_ms,
            metrics,
        })
    }

    // ===== Execution =====

    async fn resolve_metrics(&self, metric_ids: &[Uuid]) -> Result<Vec<ResolvedMetric>> {
        let mut resolved = Vec::with_capacity(metric_ids.len());

        for metric_id in metric_ids {
            let definition = self
                .metric_store
                .find_metric(metric_id)
                .await?
                .ok_or_else(|| EvalError::NotFound(format!("metric {}", metric_id)))?;

            let config = if definition.config.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&definition.config)?
            };

            let metric = self.factory.create_metric(
                &definition.metric_type,
                definition.id.to_string(),
                definition.name,
                definition.description,
                config,
            )?;

            resolved.push(ResolvedMetric {
                id: definition.id,
                metric,
            });
        }

        Ok(resolved)
    }

    /// Top of the fire-and-forget execution task: runs the items, then
    /// records the terminal state. Errors are captured on the run record and
    /// in the progress tracker, never propagated.
    async fn execute_run(
        &self,
        run_id: Uuid,
        items: Vec<DatasetItem>,
        metrics: Vec<ResolvedMetric>,
        options: ExecutionOptions,
    ) {
        if let Err(e) = self.mark_running(&run_id).await {
            tracing::error!(run_id = %run_id, error = %e, "failed to mark run running");
            return;
        }

        let metrics = Arc::new(metrics);
        let outcome = match options.mode {
            ExecutionMode::Sequential => {
                self.run_sequential(run_id, &items, &metrics, &options).await
            }
            ExecutionMode::Parallel => {
                self.run_parallel(run_id, items, Arc::clone(&metrics), &options)
                    .await
            }
        };

        match outcome {
            Ok(()) => self.finalize_completed(&run_id).await,
            Err(e) => self.finalize_failed(&run_id, &e).await,
        }

        self.schedule_cleanup(run_id);
    }

    async fn mark_running(&self, run_id: &Uuid) -> Result<()> {
        let mut run = self
            .runs
            .find_run(run_id)
            .await?
            .ok_or_else(|| EvalError::NotFound(format!("run {}", run_id)))?;
        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        self.runs.update_run(&run).await?;

        self.tracker
            .update(run_id, |progress| progress.status = RunStatus::Running)
            .await;
        Ok(())
    }

    async fn run_sequential(
        &self,
        run_id: Uuid,
        items: &[DatasetItem],
        metrics: &[ResolvedMetric],
        options: &ExecutionOptions,
    ) -> Result<()> {
        for item in items {
            self.process_item(run_id, item, metrics, options).await?;
        }
        Ok(())
    }

    /// Items fan out onto spawned tasks, capped by a counting semaphore.
    /// Completion order is not guaranteed; the processed count stays accurate
    /// because the store increments it atomically.
    async fn run_parallel(
        &self,
        run_id: Uuid,
        items: Vec<DatasetItem>,
        metrics: Arc<Vec<ResolvedMetric>>,
        options: &ExecutionOptions,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let engine = self.clone();
            let metrics = Arc::clone(&metrics);
            let semaphore = Arc::clone(&semaphore);
            let options = options.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| EvalError::Internal(e.to_string()))?;
                let outcome = engine
                    .process_item(run_id, &item, &metrics, &options)
                    .await;
                if let Err(e) = &outcome {
                    // Flip the tracker so queued items bail at their
                    // pre-processing check instead of starting work.
                    engine
                        .tracker
                        .update(&run_id, |progress| {
                            if !progress.status.is_terminal() {
                                progress.status = RunStatus::Failed;
                                progress.errors.push(e.to_string());
                            }
                        })
                        .await;
                }
                outcome
            }));
        }

        let mut first_error = None;
        for outcome in futures::future::join_all(handles).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => first_error = first_error.or(Some(e)),
                Err(e) => {
                    first_error = first_error
                        .or(Some(EvalError::Internal(format!("item task panicked: {}", e))))
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Evaluate every configured metric, in order, against one item. Each
    /// result row is persisted whether the metric succeeded, failed, errored
    /// or timed out.
    async fn process_item(
        &self,
        run_id: Uuid,
        item: &DatasetItem,
        metrics: &[ResolvedMetric],
        options: &ExecutionOptions,
    ) -> Result<()> {
        if !self.tracker.is_running(&run_id).await {
            return Err(EvalError::Stopped(format!(
                "run {} is no longer running",
                run_id
            )));
        }

        self.tracker
            .update(&run_id, |progress| {
                progress.current_item_id = Some(item.id);
            })
            .await;

        let context = EvaluationContext::from_item(item);
        let timeout = Duration::from_millis(options.timeout_ms);

        for resolved in metrics {
            let start = Instant::now();
            // Metric bodies are synchronous compute with no await points, so
            // the timeout races a spawned task rather than the future itself;
            // a timed-out computation is abandoned, not interrupted.
            let evaluation = {
                let metric = Arc::clone(&resolved.metric);
                let context = context.clone();
                tokio::spawn(async move { metric.evaluate(&context).await })
            };
            let result = match tokio::time::timeout(timeout, evaluation).await {
                Ok(Ok(Ok(result))) => result,
                Ok(Ok(Err(e))) => {
                    tracing::warn!(
                        run_id = %run_id,
                        metric_id = %resolved.id,
                        item_id = %item.id,
                        error = %e,
                        "metric evaluation failed; recording failed result"
                    );
                    MetricResult::failure(e.to_string())
                        .with_execution_time(start.elapsed().as_secs_f64() * 1000.0)
                }
                Ok(Err(e)) => MetricResult::failure(format!("metric task panicked: {}", e))
                    .with_execution_time(start.elapsed().as_secs_f64() * 1000.0),
                Err(_) => MetricResult::failure(format!(
                    "metric evaluation timed out after {} ms",
                    options.timeout_ms
                ))
                .with_execution_time(start.elapsed().as_secs_f64() * 1000.0),
            };

            let record = MetricResultRecord::new(
                run_id,
                item.id,
                resolved.id,
                result.score,
                result.passed,
                result.details.clone(),
                result.execution_time_ms,
            );
            self.runs.insert_result(&record).await?;

            if options.stop_on_first_failure && !result.passed {
                return Err(EvalError::Stopped(format!(
                    "metric {} failed on item {} with stop_on_first_failure enabled",
                    resolved.id, item.id
                )));
            }
        }

        let processed = self.runs.increment_processed(&run_id).await?;
        self.tracker
            .update(&run_id, |progress| {
                progress.processed_items = processed;
                progress.current_item_id = None;
            })
            .await;

        Ok(())
    }

    async fn finalize_completed(&self, run_id: &Uuid) {
        let summary = match self.get_evaluation_summary(run_id).await {
            Ok(summary) => serde_json::to_value(&summary).ok(),
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "summary aggregation failed");
                None
            }
        };

        match self.runs.find_run(run_id).await {
            // A concurrent stop already finalized the record; keep it.
            Ok(Some(run)) if run.status.is_terminal() => return,
            Ok(Some(mut run)) => {
                run.status = RunStatus::Completed;
                run.completed_at = Some(Utc::now());
                run.summary = summary;
                if let Err(e) = self.runs.update_run(&run).await {
                    tracing::error!(run_id = %run_id, error = %e, "failed to persist completion");
                }
                tracing::info!(
                    run_id = %run_id,
                    processed = run.processed_items,
                    "evaluation run completed"
                );
            }
            other => {
                tracing::error!(run_id = %run_id, ?other, "run record missing at completion");
            }
        }

        self.tracker
            .update(run_id, |progress| progress.status = RunStatus::Completed)
            .await;
    }

    async fn finalize_failed(&self, run_id: &Uuid, error: &EvalError) {
        tracing::error!(run_id = %run_id, error = %error, "evaluation run failed");

        match self.runs.find_run(run_id).await {
            // Stopped runs keep the stop message persisted by
            // `stop_evaluation`; the unwinding task must not replace it.
            Ok(Some(run)) if run.status.is_terminal() => return,
            Ok(Some(mut run)) => {
                run.status = RunStatus::Failed;
                run.completed_at = Some(Utc::now());
                run.error_message = Some(error.to_string());
                if let Err(e) = self.runs.update_run(&run).await {
                    tracing::error!(run_id = %run_id, error = %e, "failed to persist failure");
                }
            }
            other => {
                tracing::error!(run_id = %run_id, ?other, "run record missing at failure");
            }
        }

        let message = error.to_string();
        self.tracker
            .update(run_id, move |progress| {
                progress.status = RunStatus::Failed;
                if !progress.errors.contains(&message) {
                    progress.errors.push(message);
                }
            })
            .await;
    }

    fn schedule_cleanup(&self, run_id: Uuid) {
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            tokio::time::sleep(PROGRESS_RETENTION).await;
            tracker.remove(&run_id).await;
        });
    }
}
