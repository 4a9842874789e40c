use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use super::levenshtein::levenshtein_similarity;
use crate::metric::{finish, Metric, MetricMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EqualsConfig {
    pub case_sensitive: bool,
    pub trim_whitespace: bool,
    pub normalize_whitespace: bool,
}

impl Default for EqualsConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            trim_whitespace: true,
            normalize_whitespace: false,
        }
    }
}

/// Exact equality against the expected output, after trim, optional
/// whitespace collapse, and case folding, applied in that order.
///
/// The score is binary; `details.similarity` additionally carries a
/// normalized edit-distance similarity on the processed strings purely for
/// diagnostics and never affects pass/fail.
#[derive(Debug, Clone)]
pub struct EqualsMetric {
    meta: MetricMeta,
    config: EqualsConfig,
}

impl EqualsMetric {
    pub fn new(meta: MetricMeta, config: EqualsConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: EqualsConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }

    fn preprocess(&self, text: &str) -> String {
        let mut text = if self.config.trim_whitespace {
            text.trim().to_string()
        } else {
            text.to_string()
        };
        if self.config.normalize_whitespace {
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        if !self.config.case_sensitive {
            text = text.to_lowercase();
        }
        text
    }
}

#[async_trait]
impl Metric for EqualsMetric {
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
            EvalError::Config("equals metric requires an expectedOutput".to_string())
        })?;

        let output = self.preprocess(&context.output);
        let expected = self.preprocess(expected);

        let is_equal = output == expected;
        let similarity = levenshtein_similarity(&output, &expected);

        let details = json!({
            "processedOutput": output,
            "processedExpected": expected,
            "similarity": similarity,
            "caseSensitive": self.config.case_sensitive,
            "trimWhitespace": self.config.trim_whitespace,
            "normalizeWhitespace": self.config.normalize_whitespace,
        });

        let score = if is_equal { 1.0 } else { 0.0 };
        Ok(finish(MetricResult::new(score, is_equal, details), start))
    }
}
