use llm_eval_core::{
    clamp_score, DatasetItem, EvaluationContext, EvaluationProgress, EvaluationRun,
    EvaluationRunConfig, RunStatus,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;
use uuid::Uuid;
use validator::Validate;

// ===== Score clamping =====

#[test_case(0.5, 0.5; "in range")]
#[test_case(-0.2, 0.0; "below range")]
#[test_case(1.7, 1.0; "above range")]
#[test_case(f64::NAN, 0.0; "nan")]
fn clamp_score_bounds(input: f64, expected: f64) {
    assert_eq!(clamp_score(input), expected);
}

// ===== Context derivation =====

#[test]
fn context_from_string_input() {
    let item = DatasetItem::new(json!("just a prompt"), None, None);
    let context = EvaluationContext::from_item(&item);

    assert_eq!(context.input, "just a prompt");
    assert_eq!(context.output, "");
    assert_eq!(context.expected_output, None);
}

#[test]
fn context_from_object_prefers_input_field() {
    let item = DatasetItem::new(
        json!({ "input": "ping", "prompt": "ignored", "output": "pong" }),
        Some(json!("pong")),
        None,
    );
    let context = EvaluationContext::from_item(&item);

    assert_eq!(context.input, "ping");
    assert_eq!(context.output, "pong");
    assert_eq!(context.expected_output.as_deref(), Some("pong"));
}

#[test]
fn context_falls_back_through_prompt_and_text() {
    let item = DatasetItem::new(json!({ "prompt": "from prompt" }), None, None);
    assert_eq!(EvaluationContext::from_item(&item).input, "from prompt");

    let item = DatasetItem::new(json!({ "text": "from text" }), None, None);
    assert_eq!(EvaluationContext::from_item(&item).input, "from text");
}

#[test]
fn context_stringifies_unrecognized_objects() {
    let item = DatasetItem::new(json!({ "question": "what?" }), None, None);
    let context = EvaluationContext::from_item(&item);

    assert!(context.input.contains("question"));
    assert_eq!(context.output, "");
}

#[test]
fn context_output_from_response_and_result_fields() {
    let item = DatasetItem::new(json!({ "input": "x", "response": "from response" }), None, None);
    assert_eq!(EvaluationContext::from_item(&item).output, "from response");

    let item = DatasetItem::new(json!({ "input": "x", "result": "from result" }), None, None);
    assert_eq!(EvaluationContext::from_item(&item).output, "from result");
}

#[test]
fn context_stringifies_non_string_expected_output() {
    let item = DatasetItem::new(json!("in"), Some(json!({ "answer": 42 })), None);
    let context = EvaluationContext::from_item(&item);

    assert_eq!(context.expected_output.as_deref(), Some(r#"{"answer":42}"#));
}

// ===== Run status =====

#[test]
fn run_status_terminality() {
    assert!(!RunStatus::Pending.is_terminal());
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Completed.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
    assert!(RunStatus::Running.is_running());
    assert!(!RunStatus::Pending.is_running());
}

// ===== Run config validation =====

#[test]
fn run_config_requires_at_least_one_metric() {
    let config = EvaluationRunConfig::new(Uuid::new_v4(), vec![]);
    assert!(config.validate().is_err());

    let config = EvaluationRunConfig::new(Uuid::new_v4(), vec![Uuid::new_v4()]);
    assert!(config.validate().is_ok());
}

// ===== Progress snapshots =====

#[test]
fn progress_reconstructed_from_persisted_run() {
    let mut run = EvaluationRun::new(Uuid::new_v4(), None, 10, json!([]));
    run.status = RunStatus::Failed;
    run.processed_items = 4;
    run.error_message = Some("boom".to_string());

    let progress = EvaluationProgress::from_run(&run);
    assert_eq!(progress.run_id, run.id);
    assert_eq!(progress.status, RunStatus::Failed);
    assert_eq!(progress.total_items, 10);
    assert_eq!(progress.processed_items, 4);
    assert_eq!(progress.errors, vec!["boom".to_string()]);
}
