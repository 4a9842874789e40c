use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;

use crate::metric::{finish, tokenize, Metric, MetricMeta};

/// Substituted for a zero n-gram precision when smoothing is on.
const SMOOTHING_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BleuConfig {
    pub smoothing: bool,
    pub weights: Vec<f64>,
    pub threshold: f64,
}

impl Default for BleuConfig {
    fn default() -> Self {
        Self {
            smoothing: true,
            weights: vec![0.25, 0.25, 0.25, 0.25],
            threshold: 0.5,
        }
    }
}

fn extract_ngrams(tokens: &[String], n: usize) -> Vec<Vec<String>> {
    if tokens.len() < n || n == 0 {
        return vec![];
    }
    tokens.windows(n).map(|window| window.to_vec()).collect()
}

fn count_ngrams(ngrams: &[Vec<String>]) -> HashMap<Vec<String>, usize> {
    let mut counts = HashMap::new();
    for ngram in ngrams {
        *counts.entry(ngram.clone()).or_insert(0) += 1;
    }
    counts
}

/// Clipped n-gram match count: each candidate n-gram consumes one remaining
/// reference occurrence, so repeated candidate n-grams cannot over-count
/// against a single reference occurrence. Returns (matches, total).
fn clipped_matches(candidate: &[String], reference: &[String], n: usize) -> (usize, usize) {
    let cand_ngrams = extract_ngrams(candidate, n);
    if cand_ngrams.is_empty() {
        return (0, 0);
    }

    let mut remaining = count_ngrams(&extract_ngrams(reference, n));
    let mut matches = 0usize;

    for ngram in &cand_ngrams {
        if let Some(count) = remaining.get_mut(ngram) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }

    (matches, cand_ngrams.len())
}

fn brevity_penalty(candidate_len: usize, reference_len: usize) -> f64 {
    if candidate_len >= reference_len {
        1.0
    } else if candidate_len == 0 {
        0.0
    } else {
        (1.0 - reference_len as f64 / candidate_len as f64).exp()
    }
}

/// Combine per-order (matches, totals) counts into a BLEU score.
/// Returns (score, per-order precisions, brevity penalty).
fn bleu_from_counts(
    matches: &[usize],
    totals: &[usize],
    candidate_len: usize,
    reference_len: usize,
    weights: &[f64],
    smoothing: bool,
) -> (f64, Vec<f64>, f64) {
    let mut precisions = Vec::with_capacity(weights.len());
    let mut weighted_log_sum = 0.0;

    for (n, weight) in weights.iter().enumerate() {
        let raw = if totals[n] == 0 {
            0.0
        } else {
            matches[n] as f64 / totals[n] as f64
        };
        precisions.push(raw);

        let smoothed = if raw > 0.0 {
            raw
        } else if smoothing {
            SMOOTHING_EPSILON
        } else {
            // An unsmoothed zero precision zeroes the whole score.
            let bp = brevity_penalty(candidate_len, reference_len);
            return (0.0, precisions, bp);
        };

        weighted_log_sum += weight * smoothed.ln();
    }

    let bp = brevity_penalty(candidate_len, reference_len);
    (bp * weighted_log_sum.exp(), precisions, bp)
}

/// Sentence-level BLEU of the candidate against a single reference.
pub fn sentence_bleu(candidate: &[String], reference: &[String], config: &BleuConfig) -> (f64, Vec<f64>, f64) {
    if candidate.is_empty() {
        return (0.0, vec![0.0; config.weights.len()], 0.0);
    }

    let mut matches = Vec::with_capacity(config.weights.len());
    let mut totals = Vec::with_capacity(config.weights.len());
    for n in 1..=config.weights.len() {
        let (m, t) = clipped_matches(candidate, reference, n);
        matches.push(m);
        totals.push(t);
    }

    bleu_from_counts(
        &matches,
        &totals,
        candidate.len(),
        reference.len(),
        &config.weights,
        config.smoothing,
    )
}

/// Corpus-level BLEU: n-gram match/total counts are pooled across all pairs
/// before the precision is computed, which is numerically different from
/// averaging per-sentence scores.
pub fn corpus_bleu(
    pairs: &[(Vec<String>, Vec<String>)],
    config: &BleuConfig,
) -> (f64, Vec<f64>, f64) {
    let orders = config.weights.len();
    let mut matches = vec![0usize; orders];
    let mut totals = vec![0usize; orders];
    let mut candidate_len = 0usize;
    let mut reference_len = 0usize;

    for (candidate, reference) in pairs {
        candidate_len += candidate.len();
        reference_len += reference.len();
        for n in 1..=orders {
            let (m, t) = clipped_matches(candidate, reference, n);
            matches[n - 1] += m;
            totals[n - 1] += t;
        }
    }

    if candidate_len == 0 {
        return (0.0, vec![0.0; orders], 0.0);
    }

    bleu_from_counts(
        &matches,
        &totals,
        candidate_len,
        reference_len,
        &config.weights,
        config.smoothing,
    )
}

fn bleu_details(score: f64, precisions: &[f64], bp: f64, config: &BleuConfig, variant: &str) -> serde_json::Value {
    json!({
        "variant": variant,
        "bleu": score,
        "precisions": precisions,
        "brevityPenalty": bp,
        "smoothing": config.smoothing,
        "weights": config.weights,
        "threshold": config.threshold,
    })
}

fn require_reference(context: &EvaluationContext) -> Result<&String> {
    context.expected_output.as_ref().ok_or_else(|| {
        EvalError::Config("bleu metric requires an expectedOutput".to_string())
    })
}

/// Sentence-level BLEU against the expected output.
#[derive(Debug, Clone)]
pub struct SentenceBleuMetric {
    meta: MetricMeta,
    config: BleuConfig,
}

impl SentenceBleuMetric {
    pub fn new(meta: MetricMeta, config: BleuConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: BleuConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }
}

#[async_trait]
impl Metric for SentenceBleuMetric {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn description(&self) -> &str {
        &self.meta.description
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    async fn evaluate(&self, context: &EvaluationContext) -> Result<MetricResult> {
        let start = Instant::now();
        let reference = require_reference(context)?;

        let candidate = tokenize(&context.output);
        let reference = tokenize(reference);

        let (score, precisions, bp) = sentence_bleu(&candidate, &reference, &self.config);
        let passed = score >= self.config.threshold;
        let details = bleu_details(score, &precisions, bp, &self.config, "sentence");

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}

/// Corpus-level BLEU; here the corpus is the single (output, expected) pair,
/// but the pooled-count aggregation is kept distinct from the sentence
/// variant on purpose.
#[derive(Debug, Clone)]
pub struct CorpusBleuMetric {
    meta: MetricMeta,
    config: BleuConfig,
}

impl CorpusBleuMetric {
    pub fn new(meta: MetricMeta, config: BleuConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: BleuConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }
}

#[async_trait]
impl Metric for CorpusBleuMetric {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn description(&self) -> &str {
        &self.meta.description
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    async fn evaluate(&self, context: &EvaluationContext) -> Result<MetricResult> {
        let start = Instant::now();
        let reference = require_reference(context)?;

        let pairs = vec![(tokenize(&context.output), tokenize(reference))];
        let (score, precisions, bp) = corpus_bleu(&pairs, &self.config);
        let passed = score >= self.config.threshold;
        let details = bleu_details(score, &precisions, bp, &self.config, "corpus");

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
