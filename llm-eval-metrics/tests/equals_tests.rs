use approx::assert_relative_eq;
use llm_eval_core::{EvalError, EvaluationContext};
use llm_eval_metrics::{EqualsConfig, EqualsMetric, Metric, MetricMeta};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn metric(config: EqualsConfig) -> EqualsMetric {
    EqualsMetric::new(MetricMeta::new("m1", "Equals", "test metric"), config)
}

fn context(output: &str, expected: &str) -> EvaluationContext {
    EvaluationContext::new("input", output).with_expected_output(expected)
}

#[rstest]
#[case("pong", "pong")]
#[case("", "")]
#[case("  padded  ", "padded")]
#[case("Mixed Case", "mixed case")]
#[tokio::test]
async fn identical_after_defaults_passes(#[case] output: &str, #[case] expected: &str) {
    let result = metric(EqualsConfig::default())
        .evaluate(&context(output, expected))
        .await
        .unwrap();

    assert!(result.passed);
    assert_eq!(result.score, 1.0);
}

#[tokio::test]
async fn case_sensitive_comparison_fails_on_case_difference() {
    let result = metric(EqualsConfig {
        case_sensitive: true,
        ..Default::default()
    })
    .evaluate(&context("Hello", "hello"))
    .await
    .unwrap();

    assert!(!result.passed);
    assert_eq!(result.score, 0.0);
}

#[tokio::test]
async fn whitespace_normalization_collapses_runs() {
    let config = EqualsConfig {
        normalize_whitespace: true,
        ..Default::default()
    };
    let result = metric(config)
        .evaluate(&context("a   b\t c", "a b c"))
        .await
        .unwrap();

    assert!(result.passed);
}

#[tokio::test]
async fn similarity_diagnostic_does_not_affect_pass() {
    let result = metric(EqualsConfig::default())
        .evaluate(&context("abcd", "abce"))
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.score, 0.0);
    let similarity = result.details["similarity"].as_f64().unwrap();
    assert_relative_eq!(similarity, 0.75, epsilon = 1e-9);
}

#[tokio::test]
async fn missing_expected_output_is_an_error() {
    let context = EvaluationContext::new("input", "output");
    let err = metric(EqualsConfig::default())
        .evaluate(&context)
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Config(_)));
}
