use approx::assert_relative_eq;
use llm_eval_core::{EvalError, EvaluationContext};
use llm_eval_metrics::{
    BleuConfig, CorpusBleuMetric, Metric, MetricMeta, SentenceBleuMetric,
};

fn sentence(config: BleuConfig) -> SentenceBleuMetric {
    SentenceBleuMetric::new(MetricMeta::new("m1", "BLEU", "test metric"), config)
}

fn corpus(config: BleuConfig) -> CorpusBleuMetric {
    CorpusBleuMetric::new(MetricMeta::new("m2", "Corpus BLEU", "test metric"), config)
}

fn context(output: &str, expected: &str) -> EvaluationContext {
    EvaluationContext::new("input", output).with_expected_output(expected)
}

#[tokio::test]
async fn exact_match_scores_one() {
    let text = "the quick brown fox jumps over the lazy dog";
    let result = sentence(BleuConfig::default())
        .evaluate(&context(text, text))
        .await
        .unwrap();

    assert_relative_eq!(result.score, 1.0, epsilon = 1e-9);
    assert!(result.passed);
    assert_relative_eq!(result.details["brevityPenalty"].as_f64().unwrap(), 1.0);
}

#[tokio::test]
async fn disjoint_texts_score_zero_without_smoothing() {
    let result = sentence(BleuConfig {
        smoothing: false,
        ..Default::default()
    })
    .evaluate(&context("aa bb cc dd", "ww xx yy zz"))
    .await
    .unwrap();

    assert_eq!(result.score, 0.0);
    assert!(!result.passed);
}

#[tokio::test]
async fn disjoint_texts_score_near_zero_with_smoothing() {
    let result = sentence(BleuConfig::default())
        .evaluate(&context("aa bb cc dd", "ww xx yy zz"))
        .await
        .unwrap();

    assert!(result.score < 1e-3);
    assert!(!result.passed);
}

#[tokio::test]
async fn brevity_penalty_punishes_short_candidates() {
    // Candidate is a strict prefix of the reference: every n-gram precision
    // is 1 so the whole gap comes from the brevity penalty.
    let result = sentence(BleuConfig::default())
        .evaluate(&context("the quick brown fox", "the quick brown fox jumps over dogs"))
        .await
        .unwrap();

    let expected_bp = (1.0f64 - 7.0 / 4.0).exp();
    assert_relative_eq!(
        result.details["brevityPenalty"].as_f64().unwrap(),
        expected_bp,
        epsilon = 1e-9
    );
    assert!(result.score < 1.0);
}

#[tokio::test]
async fn repeated_candidate_ngrams_are_clipped() {
    let clipped = sentence(BleuConfig::default())
        .evaluate(&context("the the the the", "the cat sat down"))
        .await
        .unwrap();

    // Only one "the" in the reference can be matched.
    let precisions = clipped.details["precisions"].as_array().unwrap();
    assert_relative_eq!(precisions[0].as_f64().unwrap(), 0.25, epsilon = 1e-9);
}

#[tokio::test]
async fn empty_candidate_scores_zero() {
    let result = sentence(BleuConfig::default())
        .evaluate(&context("", "some reference text"))
        .await
        .unwrap();

    assert_eq!(result.score, 0.0);
}

#[tokio::test]
async fn corpus_variant_matches_on_exact_text() {
    let text = "pooled counts still give a perfect score here";
    let result = corpus(BleuConfig::default())
        .evaluate(&context(text, text))
        .await
        .unwrap();

    assert_relative_eq!(result.score, 1.0, epsilon = 1e-9);
    assert_eq!(result.details["variant"], "corpus");
}

#[tokio::test]
async fn missing_reference_is_an_error() {
    let err = sentence(BleuConfig::default())
        .evaluate(&EvaluationContext::new("input", "output"))
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Config(_)));
}
