use llm_eval_core::{
    DatasetItem, EvalError, EvaluationDefinition, EvaluationRun, EvaluationRunConfig,
    ExecutionMode, ExecutionOptions, MetricDefinition, RunStatus, RunStore,
};
use llm_eval_engine::EvaluationEngine;
use llm_eval_storage::{
    InMemoryDatasetSource, InMemoryEvaluationStore, InMemoryMetricStore, InMemoryRunStore,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    engine: EvaluationEngine,
    datasets: Arc<InMemoryDatasetSource>,
    evaluations: Arc<InMemoryEvaluationStore>,
    metrics: Arc<InMemoryMetricStore>,
    runs: Arc<InMemoryRunStore>,
}

impl Harness {
    fn new() -> Self {
        let datasets = Arc::new(InMemoryDatasetSource::new());
        let evaluations = Arc::new(InMemoryEvaluationStore::new());
        let metrics = Arc::new(InMemoryMetricStore::new());
        let runs = Arc::new(InMemoryRunStore::new());
        let engine = EvaluationEngine::new(
            datasets.clone(),
            evaluations.clone(),
            metrics.clone(),
            runs.clone(),
        );
        Self {
            engine,
            datasets,
            evaluations,
            metrics,
            runs,
        }
    }

    fn seed_evaluation(&self) -> Uuid {
        let definition = EvaluationDefinition {
            id: Uuid::new_v4(),
            name: "chat quality".to_string(),
            description: None,
        };
        let id = definition.id;
        self.evaluations.insert_evaluation(definition);
        id
    }

    fn seed_metric(&self, metric_type: &str, config: serde_json::Value) -> Uuid {
        let definition = MetricDefinition {
            id: Uuid::new_v4(),
            name: metric_type.to_string(),
            description: String::new(),
            metric_type: metric_type.to_string(),
            config: config.to_string(),
        };
        let id = definition.id;
        self.metrics.insert_metric(definition);
        id
    }

    async fn wait_for_terminal(&self, run_id: &Uuid) -> EvaluationRun {
        for _ in 0..500 {
            if let Some(run) = self.runs.find_run(run_id).await.unwrap() {
                if run.status.is_terminal() {
                    return run;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} never reached a terminal status", run_id);
    }
}

/// Item whose derived output matches its expected output.
fn passing_item(reply: &str) -> DatasetItem {
    DatasetItem::new(
        json!({ "input": "ping", "output": reply }),
        Some(json!(reply)),
        None,
    )
}

fn failing_item() -> DatasetItem {
    DatasetItem::new(
        json!({ "input": "ping", "output": "wrong answer" }),
        Some(json!("pong")),
        None,
    )
}

#[tokio::test]
async fn completed_run_persists_one_row_per_item_and_metric() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));
    let contains = harness.seed_metric("contains", json!({ "expectedText": ["pong"] }));

    let items = vec![
        passing_item("pong"),
        passing_item("pong"),
        passing_item("pong"),
    ];
    let config = EvaluationRunConfig::new(evaluation_id, vec![equals, contains]).with_items(items);

    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_items, 3);
    assert_eq!(run.processed_items, 3);
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());
    assert!(run.summary.is_some());

    let records = harness.runs.results_for_run(&run_id).await.unwrap();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.passed));
}

#[tokio::test]
async fn dataset_id_path_loads_items_from_the_source() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));

    let dataset_id = Uuid::new_v4();
    harness
        .datasets
        .insert_dataset(dataset_id, vec![passing_item("pong"), passing_item("pong")]);

    let config = EvaluationRunConfig::new(evaluation_id, vec![equals]).with_dataset(dataset_id);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.dataset_id, Some(dataset_id));
    assert_eq!(run.processed_items, 2);
}

#[tokio::test]
async fn parallel_mode_processes_every_item() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));
    let levenshtein = harness.seed_metric("levenshtein", json!({}));

    let items = (0..4).map(|_| passing_item("pong")).collect();
    let config = EvaluationRunConfig::new(evaluation_id, vec![equals, levenshtein])
        .with_items(items)
        .with_options(ExecutionOptions {
            mode: ExecutionMode::Parallel,
            max_concurrency: 2,
            ..Default::default()
        });

    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.processed_items, 4);
    let records = harness.runs.results_for_run(&run_id).await.unwrap();
    assert_eq!(records.len(), 8);
}

#[tokio::test]
async fn stop_on_first_failure_fails_the_run_after_one_row() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));

    let items = vec![failing_item(), passing_item("pong"), passing_item("pong")];
    let config = EvaluationRunConfig::new(evaluation_id, vec![equals])
        .with_items(items)
        .with_options(ExecutionOptions {
            stop_on_first_failure: true,
            ..Default::default()
        });

    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());
    // The failing row is persisted, the remaining items never start.
    let records = harness.runs.results_for_run(&run_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].passed);
    assert_eq!(run.processed_items, 0);
}

#[tokio::test]
async fn metric_errors_are_recorded_without_failing_the_run() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    // ROUGE needs an expected output; the item below has none.
    let rouge = harness.seed_metric("rouge", json!({}));

    let item = DatasetItem::new(json!({ "input": "ping", "output": "pong" }), None, None);
    let config = EvaluationRunConfig::new(evaluation_id, vec![rouge]).with_items(vec![item]);

    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.processed_items, 1);

    let records = harness.runs.results_for_run(&run_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].passed);
    assert_eq!(records[0].score, 0.0);
    assert!(records[0].details["error"].is_string());
}

#[tokio::test]
async fn empty_metric_list_is_rejected_before_anything_starts() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();

    let config =
        EvaluationRunConfig::new(evaluation_id, Vec::new()).with_items(vec![passing_item("pong")]);
    let err = harness.engine.start_evaluation_run(config).await.unwrap_err();
    assert!(matches!(err, EvalError::Validation(_)));
}

#[tokio::test]
async fn missing_dataset_and_items_is_rejected() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));

    let config = EvaluationRunConfig::new(evaluation_id, vec![equals]);
    let err = harness.engine.start_evaluation_run(config).await.unwrap_err();
    assert!(matches!(err, EvalError::Validation(_)));
}

#[tokio::test]
async fn unknown_evaluation_is_not_found() {
    let harness = Harness::new();
    let equals = harness.seed_metric("equals", json!({}));

    let config = EvaluationRunConfig::new(Uuid::new_v4(), vec![equals])
        .with_items(vec![passing_item("pong")]);
    let err = harness.engine.start_evaluation_run(config).await.unwrap_err();
    assert!(matches!(err, EvalError::NotFound(_)));
}

#[tokio::test]
async fn unknown_metric_id_is_not_found() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();

    let config = EvaluationRunConfig::new(evaluation_id, vec![Uuid::new_v4()])
        .with_items(vec![passing_item("pong")]);
    let err = harness.engine.start_evaluation_run(config).await.unwrap_err();
    assert!(matches!(err, EvalError::NotFound(_)));
}

#[tokio::test]
async fn progress_for_unknown_run_is_none() {
    let harness = Harness::new();
    let progress = harness.engine.get_progress(&Uuid::new_v4()).await.unwrap();
    assert!(progress.is_none());
}

#[tokio::test]
async fn progress_reflects_the_finished_run() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));

    let config = EvaluationRunConfig::new(evaluation_id, vec![equals])
        .with_items(vec![passing_item("pong"), passing_item("pong")]);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    harness.wait_for_terminal(&run_id).await;

    // The tracker entry may be flipped to its terminal status a beat after
    // the record is persisted.
    for _ in 0..100 {
        let progress = harness.engine.get_progress(&run_id).await.unwrap().unwrap();
        if progress.status == RunStatus::Completed {
            assert_eq!(progress.processed_items, 2);
            assert_eq!(progress.total_items, 2);
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("progress never reported completion");
}

#[tokio::test]
async fn subscription_observes_the_terminal_status() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));

    let config = EvaluationRunConfig::new(evaluation_id, vec![equals])
        .with_items(vec![passing_item("pong")]);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();

    let mut receiver = harness
        .engine
        .subscribe(&run_id)
        .await
        .expect("run should be tracked right after start");

    harness.wait_for_terminal(&run_id).await;
    for _ in 0..100 {
        if receiver.borrow().status.is_terminal() {
            assert_eq!(receiver.borrow().status, RunStatus::Completed);
            return;
        }
        receiver.changed().await.unwrap();
    }
    panic!("subscription never observed a terminal status");
}

#[tokio::test]
async fn stopping_a_run_that_is_not_running_reports_no_effect() {
    let harness = Harness::new();
    assert!(!harness.engine.stop_evaluation(&Uuid::new_v4()).await.unwrap());

    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));
    let config = EvaluationRunConfig::new(evaluation_id, vec![equals])
        .with_items(vec![passing_item("pong")]);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    harness.wait_for_terminal(&run_id).await;

    // Wait out the window between run persistence and the tracker flip.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!harness.engine.stop_evaluation(&run_id).await.unwrap());
}

#[tokio::test]
async fn stopping_a_running_evaluation_keeps_the_stop_message() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let levenshtein = harness.seed_metric("levenshtein", json!({}));

    // Enough edit-distance work per item that the run is still going when
    // the stop lands.
    let output = "a".repeat(1200);
    let expected = "b".repeat(1200);
    let items: Vec<DatasetItem> = (0..1000)
        .map(|_| {
            DatasetItem::new(
                json!({ "input": "ping", "output": output }),
                Some(json!(expected)),
                None,
            )
        })
        .collect();

    let config = EvaluationRunConfig::new(evaluation_id, vec![levenshtein]).with_items(items);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();

    for _ in 0..500 {
        if let Some(progress) = harness.engine.get_progress(&run_id).await.unwrap() {
            if progress.status == RunStatus::Running {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(harness.engine.stop_evaluation(&run_id).await.unwrap());

    let run = harness.wait_for_terminal(&run_id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("Evaluation stopped by user")
    );
    assert!(run.processed_items < run.total_items);

    let progress = harness.engine.get_progress(&run_id).await.unwrap().unwrap();
    assert_eq!(progress.status, RunStatus::Failed);
    assert!(progress.errors.iter().any(|e| e.contains("stopped by user")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_metric_records_a_failed_row_and_the_run_continues() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let levenshtein = harness.seed_metric("levenshtein", json!({}));
    let contains = harness.seed_metric("contains", json!({ "expectedText": ["lorem"] }));

    // The edit-distance pass over these is far slower than the timeout; the
    // substring check is far faster.
    let text = "lorem ipsum ".repeat(500);
    let item = DatasetItem::new(
        json!({ "input": "ping", "output": text }),
        Some(json!(text)),
        None,
    );

    let config = EvaluationRunConfig::new(evaluation_id, vec![levenshtein, contains])
        .with_items(vec![item])
        .with_options(ExecutionOptions {
            timeout_ms: 10,
            ..Default::default()
        });

    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.processed_items, 1);

    let records = harness.runs.results_for_run(&run_id).await.unwrap();
    assert_eq!(records.len(), 2);

    let timed_out = records.iter().find(|r| r.metric_id == levenshtein).unwrap();
    assert!(!timed_out.passed);
    assert_eq!(timed_out.score, 0.0);
    assert!(timed_out.details["error"]
        .as_str()
        .unwrap()
        .contains("timed out after 10 ms"));

    let fast = records.iter().find(|r| r.metric_id == contains).unwrap();
    assert!(fast.passed);
}

#[tokio::test]
async fn summary_aggregates_per_item_and_per_metric() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let equals = harness.seed_metric("equals", json!({}));

    let config = EvaluationRunConfig::new(evaluation_id, vec![equals])
        .with_items(vec![passing_item("pong"), failing_item()]);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    harness.wait_for_terminal(&run_id).await;

    let summary = harness.engine.get_evaluation_summary(&run_id).await.unwrap();
    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.passed_items, 1);
    assert_eq!(summary.failed_items, 1);
    assert_eq!(summary.average_score, 0.5);

    assert_eq!(summary.metrics.len(), 1);
    let metric_summary = &summary.metrics[0];
    assert_eq!(metric_summary.metric_id, equals);
    assert_eq!(metric_summary.evaluations, 2);
    assert_eq!(metric_summary.passed, 1);
    assert_eq!(metric_summary.average_score, 0.5);
}

#[tokio::test]
async fn summary_for_unknown_run_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .engine
        .get_evaluation_summary(&Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::NotFound(_)));
}

#[tokio::test]
async fn metric_aliases_work_through_stored_definitions() {
    let harness = Harness::new();
    let evaluation_id = harness.seed_evaluation();
    let exact = harness.seed_metric("exactmatch", json!({}));

    let config = EvaluationRunConfig::new(evaluation_id, vec![exact])
        .with_items(vec![passing_item("pong")]);
    let run_id = harness.engine.start_evaluation_run(config).await.unwrap();
    let run = harness.wait_for_terminal(&run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    let records = harness.runs.results_for_run(&run_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].passed);
}
