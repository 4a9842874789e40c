use approx::assert_relative_eq;
use llm_eval_core::{EvalError, EvaluationContext};
use llm_eval_metrics::{Metric, MetricMeta, RougeConfig, RougeMetric, RougeType};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn metric(config: RougeConfig) -> RougeMetric {
    RougeMetric::new(MetricMeta::new("m1", "ROUGE", "test metric"), config)
}

fn context(output: &str, expected: &str) -> EvaluationContext {
    EvaluationContext::new("input", output).with_expected_output(expected)
}

#[rstest]
#[case(RougeType::Rouge1)]
#[case(RougeType::Rouge2)]
#[case(RougeType::RougeL)]
#[tokio::test]
async fn identical_sequences_score_one(#[case] rouge_type: RougeType) {
    let result = metric(RougeConfig {
        rouge_type,
        ..Default::default()
    })
    .evaluate(&context("the cat sat on the mat", "the cat sat on the mat"))
    .await
    .unwrap();

    assert_relative_eq!(result.score, 1.0, epsilon = 1e-9);
    assert_relative_eq!(result.details["precision"].as_f64().unwrap(), 1.0);
    assert_relative_eq!(result.details["recall"].as_f64().unwrap(), 1.0);
    assert!(result.passed);
}

#[rstest]
#[case(RougeType::Rouge1)]
#[case(RougeType::Rouge2)]
#[case(RougeType::RougeL)]
#[tokio::test]
async fn disjoint_sequences_score_zero(#[case] rouge_type: RougeType) {
    let result = metric(RougeConfig {
        rouge_type,
        ..Default::default()
    })
    .evaluate(&context("hello world", "goodbye universe"))
    .await
    .unwrap();

    assert_eq!(result.score, 0.0);
    assert!(!result.passed);
}

#[tokio::test]
async fn rouge1_partial_overlap_uses_beta_f_score() {
    let result = metric(RougeConfig::default())
        .evaluate(&context("the cat sat", "the cat ran"))
        .await
        .unwrap();

    // Overlap 2 of 3 unique unigrams on both sides: P = R = 2/3, so the
    // beta-weighted F collapses to 2/3 regardless of beta.
    assert_relative_eq!(result.score, 2.0 / 3.0, epsilon = 1e-9);
    assert!(result.passed);
}

#[tokio::test]
async fn rouge2_counts_bigram_overlap() {
    let result = metric(RougeConfig {
        rouge_type: RougeType::Rouge2,
        ..Default::default()
    })
    .evaluate(&context("a b c d", "a b x d"))
    .await
    .unwrap();

    // Bigrams: {ab, bc, cd} vs {ab, bx, xd}; only "a b" overlaps.
    assert_relative_eq!(
        result.details["precision"].as_f64().unwrap(),
        1.0 / 3.0,
        epsilon = 1e-9
    );
}

#[tokio::test]
async fn rouge_l_rewards_in_order_subsequences() {
    let result = metric(RougeConfig {
        rouge_type: RougeType::RougeL,
        threshold: 0.4,
        ..Default::default()
    })
    .evaluate(&context("the quick fox jumped", "the fox jumped high"))
    .await
    .unwrap();

    // LCS "the fox jumped" has length 3 against two 4-token sequences.
    assert_relative_eq!(
        result.details["precision"].as_f64().unwrap(),
        0.75,
        epsilon = 1e-9
    );
    assert_relative_eq!(result.details["recall"].as_f64().unwrap(), 0.75, epsilon = 1e-9);
    assert!(result.passed);
}

#[tokio::test]
async fn missing_reference_is_an_error() {
    let err = metric(RougeConfig::default())
        .evaluate(&EvaluationContext::new("input", "output"))
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Config(_)));
}
