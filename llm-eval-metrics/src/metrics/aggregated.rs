use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::factory::MetricFactory;
use crate::metric::{finish, Metric, MetricMeta};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Mean,
    WeightedMean,
    Min,
    Max,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubMetricSpec {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatedConfig {
    pub metrics: Vec<SubMetricSpec>,
    pub aggregation_method: AggregationMethod,
    pub weights: Option<Vec<f64>>,
    pub threshold: f64,
}

impl Default for AggregatedConfig {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            aggregation_method: AggregationMethod::Mean,
            weights: None,
            threshold: 0.5,
        }
    }
}

/// Composes other metrics: every sub-metric is instantiated through the same
/// factory, evaluated against the same context, and the scores are combined
/// by the configured method. Every sub-result is retained for diagnostics.
pub struct AggregatedMetric {
    meta: MetricMeta,
    config: AggregatedConfig,
}

impl AggregatedMetric {
    pub fn new(meta: MetricMeta, config: AggregatedConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: AggregatedConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }

    fn combine(&self, scores: &[f64]) -> Result<f64> {
        match self.config.aggregation_method {
            AggregationMethod::Mean => {
                Ok(scores.iter().sum::<f64>() / scores.len() as f64)
            }
            AggregationMethod::WeightedMean => {
                let weights = self.config.weights.as_ref().ok_or_else(|| {
                    EvalError::Config(
                        "weighted_mean aggregation requires a weights list".to_string(),
                    )
                })?;
                if weights.len() != scores.len() {
                    return Err(EvalError::Config(format!(
                        "weights length {} does not match metrics length {}",
                        weights.len(),
                        scores.len()
                    )));
                }
                let weight_sum: f64 = weights.iter().sum();
                if weight_sum == 0.0 {
                    return Err(EvalError::Config(
                        "weighted_mean aggregation requires a non-zero weight sum".to_string(),
                    ));
                }
                let weighted: f64 = scores.iter().zip(weights).map(|(s, w)| s * w).sum();
                Ok(weighted / weight_sum)
            }
            AggregationMethod::Min => Ok(scores.iter().copied().fold(f64::INFINITY, f64::min)),
            AggregationMethod::Max => Ok(scores.iter().copied().fold(0.0, f64::max)),
        }
    }
}

#[async_trait]
impl Metric for AggregatedMetric {
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

        if self.config.metrics.is_empty() {
            return Err(EvalError::Config(
                "aggregated metric requires at least one sub-metric".to_string(),
            ));
        }
        if self.config.aggregation_method == AggregationMethod::WeightedMean {
            match &self.config.weights {
                Some(weights) if weights.len() == self.config.metrics.len() => {}
                _ => {
                    return Err(EvalError::Config(
                        "weighted_mean aggregation requires weights matching the metrics list"
                            .to_string(),
                    ))
                }
            }
        }

        let factory = MetricFactory::new();
        let mut scores = Vec::with_capacity(self.config.metrics.len());
        let mut sub_results = Vec::with_capacity(self.config.metrics.len());

        for (index, spec) in self.config.metrics.iter().enumerate() {
            let sub_id = format!("{}:{}", self.meta.id, index);
            let sub_name = spec
                .name
                .clone()
                .unwrap_or_else(|| spec.metric_type.clone());
            let sub_description = spec.description.clone().unwrap_or_default();

            let metric = factory.create_metric(
                &spec.metric_type,
                sub_id,
                sub_name.clone(),
                sub_description,
                spec.config.clone(),
            )?;

            let result = metric.evaluate(context).await?;
            scores.push(result.score);
            sub_results.push(json!({
                "name": sub_name,
                "type": spec.metric_type,
                "score": result.score,
                "passed": result.passed,
                "details": result.details,
            }));
        }

        let combined = self.combine(&scores)?;
        let passed = combined >= self.config.threshold;

        let details = json!({
            "aggregationMethod": self.config.aggregation_method,
            "weights": self.config.weights,
            "subResults": sub_results,
            "threshold": self.config.threshold,
        });

        Ok(finish(MetricResult::new(combined, passed, details), start))
    }
}
