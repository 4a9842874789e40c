use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::metric::{finish, Metric, MetricMeta};

/// Classic edit distance (insert/delete/substitute at cost 1) over unicode
/// scalar values, via the usual two-row dynamic program.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity `1 − distance/maxLength`; 1 when both strings are empty.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevenshteinConfig {
    pub threshold: f64,
    pub normalize: bool,
    pub case_sensitive: bool,
    pub trim_whitespace: bool,
}

impl Default for LevenshteinConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            normalize: true,
            case_sensitive: false,
            trim_whitespace: true,
        }
    }
}

/// Edit-distance similarity against the expected output.
#[derive(Debug, Clone)]
pub struct LevenshteinMetric {
    meta: MetricMeta,
    config: LevenshteinConfig,
}

impl LevenshteinMetric {
    pub fn new(meta: MetricMeta, config: LevenshteinConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: LevenshteinConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }

    fn preprocess(&self, text: &str) -> String {
        let text = if self.config.trim_whitespace {
            text.trim()
        } else {
            text
        };
        if self.config.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }
}

#[async_trait]
impl Metric for LevenshteinMetric {
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

        let expected = context.expected_output.as_ref().ok_or_else(|| {
            EvalError::Config("levenshtein metric requires an expectedOutput".to_string())
        })?;

        let output = self.preprocess(&context.output);
        let expected = self.preprocess(expected);

        let distance = levenshtein_distance(&output, &expected);
        let max_length = output.chars().count().max(expected.chars().count());
        let similarity = if max_length == 0 {
            1.0
        } else {
            1.0 - distance as f64 / max_length as f64
        };

        // Without normalization the score is binary exact-match; the raw
        // distance stays available in the details either way.
        let score = if self.config.normalize {
            similarity
        } else if distance == 0 {
            1.0
        } else {
            0.0
        };

        let passed = score >= self.config.threshold;

        let details = json!({
            "distance": distance,
            "maxLength": max_length,
            "similarity": similarity,
            "threshold": self.config.threshold,
            "normalize": self.config.normalize,
        });

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
