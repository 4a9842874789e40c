use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::metric::{finish, Metric, MetricMeta};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContainsMatchType {
    Any,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainsConfig {
    pub expected_text: Vec<String>,
    pub case_sensitive: bool,
    pub match_type: ContainsMatchType,
}

impl Default for ContainsConfig {
    fn default() -> Self {
        Self {
            expected_text: Vec::new(),
            case_sensitive: false,
            match_type: ContainsMatchType::Any,
        }
    }
}

/// Substring presence check against one or more target strings.
///
/// `all` mode scores fractionally (found/total) while `any` mode is strictly
/// binary. That asymmetry is observed upstream behavior and is part of the
/// contract; do not make `any` fractional.
#[derive(Debug, Clone)]
pub struct ContainsMetric {
    meta: MetricMeta,
    config: ContainsConfig,
}

impl ContainsMetric {
    pub fn new(meta: MetricMeta, config: ContainsConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: ContainsConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }

    fn offsets_of(haystack: &str, needle: &str) -> Vec<usize> {
        if needle.is_empty() {
            return Vec::new();
        }
        haystack.match_indices(needle).map(|(i, _)| i).collect()
    }
}

#[async_trait]
impl Metric for ContainsMetric {
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

        if self.config.expected_text.is_empty() {
            return Err(EvalError::Config(
                "contains metric requires a non-empty expectedText list".to_string(),
            ));
        }

        let haystack = if self.config.case_sensitive {
            context.output.clone()
        } else {
            context.output.to_lowercase()
        };

        let mut matches = Vec::new();
        let mut found_count = 0usize;

        for target in &self.config.expected_text {
            let needle = if self.config.case_sensitive {
                target.clone()
            } else {
                target.to_lowercase()
            };

            let offsets = Self::offsets_of(&haystack, &needle);
            let found = !offsets.is_empty();
            if found {
                found_count += 1;
            }

            matches.push(json!({
                "text": target,
                "found": found,
                "offsets": offsets,
            }));
        }

        let total_count = self.config.expected_text.len();
        let (score, passed) = match self.config.match_type {
            ContainsMatchType::All => {
                let score = found_count as f64 / total_count as f64;
                (score, found_count == total_count)
            }
            // `any` is binary on purpose, unlike the fractional `all` mode.
            ContainsMatchType::Any => {
                let passed = found_count > 0;
                (if passed { 1.0 } else { 0.0 }, passed)
            }
        };

        let details = json!({
            "matches": matches,
            "foundCount": found_count,
            "totalCount": total_count,
            "matchType": self.config.match_type,
            "caseSensitive": self.config.case_sensitive,
        });

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
