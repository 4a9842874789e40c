use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clamp a raw metric score into [0, 1]. Centralized so a buggy metric
/// cannot leak an out-of-range score into aggregate statistics.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// Output of one metric evaluation against one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub score: f64,
    pub passed: bool,
    pub details: serde_json::Value,
    pub execution_time_ms: f64,
}

impl MetricResult {
    /// The only constructor; every score passes through `clamp_score`.
    pub fn new(score: f64, passed: bool, details: serde_json::Value) -> Self {
        Self {
            score: clamp_score(score),
            passed,
            details,
            execution_time_ms: 0.0,
        }
    }

    pub fn with_execution_time(mut self, elapsed_ms: f64) -> Self {
        self.execution_time_ms = elapsed_ms;
        self
    }

    /// A zero-score failed result carrying an error diagnostic, used when a
    /// metric evaluation throws or times out and the run carries on.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            passed: false,
            details: serde_json::json!({ "error": error.into() }),
            execution_time_ms: 0.0,
        }
    }
}

/// A stored metric configuration, as served by the external metric store.
/// `config` is the serialized JSON the configuration UI authored; the engine
/// deserializes it and builds the runtime metric through the factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub metric_type: String,
    pub config: String,
}

/// Evaluation metadata, as served by the external evaluation store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}
