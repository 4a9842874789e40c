use async_trait::async_trait;
use llm_eval_core::{EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The capability every metric variant implements.
///
/// `evaluate` is async even though most implementations are synchronous
/// string/array work; the uniform seam lets a future metric call out to an
/// external scoring service without changing the contract. Implementations
/// must be side-effect-free with respect to shared state so that concurrent
/// invocation with different contexts is safe.
#[async_trait]
pub trait Metric: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn config(&self) -> serde_json::Value;

    async fn evaluate(&self, context: &EvaluationContext) -> Result<MetricResult>;
}

/// Identity shared by every metric instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMeta {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl MetricMeta {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Milliseconds elapsed since `start`, for `MetricResult::execution_time_ms`.
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Lowercased whitespace tokenization shared by the n-gram metrics.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|s| s.to_lowercase()).collect()
}

/// Finish a `MetricResult` with the elapsed time of this evaluation.
pub fn finish(result: MetricResult, start: Instant) -> MetricResult {
    result.with_execution_time(elapsed_ms(start))
}
