use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::time::Instant;

use crate::metric::{finish, tokenize, Metric, MetricMeta};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RougeType {
    #[serde(rename = "rouge-1")]
    Rouge1,
    #[serde(rename = "rouge-2")]
    Rouge2,
    #[serde(rename = "rouge-l")]
    RougeL,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RougeConfig {
    pub rouge_type: RougeType,
    pub beta: f64,
    pub threshold: f64,
}

impl Default for RougeConfig {
    fn default() -> Self {
        Self {
            rouge_type: RougeType::Rouge1,
            beta: 1.2,
            threshold: 0.5,
        }
    }
}

fn ngram_set(tokens: &[String], n: usize) -> HashSet<Vec<String>> {
    if tokens.len() < n || n == 0 {
        return HashSet::new();
    }
    tokens.windows(n).map(|window| window.to_vec()).collect()
}

/// Longest common subsequence length over token sequences.
fn lcs_length(a: &[String], b: &[String]) -> usize {
    let m = a.len();
    let n = b.len();

    if m == 0 || n == 0 {
        return 0;
    }

    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            if a[i - 1] == b[j - 1] {
                dp[i][j] = dp[i - 1][j - 1] + 1;
            } else {
                dp[i][j] = dp[i - 1][j].max(dp[i][j - 1]);
            }
        }
    }

    dp[m][n]
}

/// F-score with the beta parameter: (1+β²)·P·R / (β²·P + R), 0 when P+R=0.
fn f_score(precision: f64, recall: f64, beta: f64) -> f64 {
    if precision + recall == 0.0 {
        return 0.0;
    }
    let beta_sq = beta * beta;
    (1.0 + beta_sq) * precision * recall / (beta_sq * precision + recall)
}

/// ROUGE recall/precision/F against the expected output.
///
/// rouge-1 and rouge-2 use unique n-gram set overlap; rouge-l runs an LCS
/// dynamic program over the full token sequences.
#[derive(Debug, Clone)]
pub struct RougeMetric {
    meta: MetricMeta,
    config: RougeConfig,
}

impl RougeMetric {
    pub fn new(meta: MetricMeta, config: RougeConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: RougeConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }

    fn scores(&self, candidate: &[String], reference: &[String]) -> (f64, f64) {
        match self.config.rouge_type {
            RougeType::Rouge1 | RougeType::Rouge2 => {
                let n = if self.config.rouge_type == RougeType::Rouge1 {
                    1
                } else {
                    2
                };
                let cand_set = ngram_set(candidate, n);
                let ref_set = ngram_set(reference, n);

                if cand_set.is_empty() || ref_set.is_empty() {
                    return (0.0, 0.0);
                }

                let overlap = cand_set.intersection(&ref_set).count();
                (
                    overlap as f64 / cand_set.len() as f64,
                    overlap as f64 / ref_set.len() as f64,
                )
            }
            RougeType::RougeL => {
                if candidate.is_empty() || reference.is_empty() {
                    return (0.0, 0.0);
                }
                let lcs = lcs_length(candidate, reference);
                (
                    lcs as f64 / candidate.len() as f64,
                    lcs as f64 / reference.len() as f64,
                )
            }
        }
    }
}

#[async_trait]
impl Metric for RougeMetric {
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

        let reference = context.expected_output.as_ref().ok_or_else(|| {
            EvalError::Config("rouge metric requires an expectedOutput".to_string())
        })?;

        let candidate = tokenize(&context.output);
        let reference = tokenize(reference);

        let (precision, recall) = self.scores(&candidate, &reference);
        let score = f_score(precision, recall, self.config.beta);
        let passed = score >= self.config.threshold;

        let details = json!({
            "rougeType": self.config.rouge_type,
            "precision": precision,
            "recall": recall,
            "fScore": score,
            "beta": self.config.beta,
            "threshold": self.config.threshold,
        });

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
