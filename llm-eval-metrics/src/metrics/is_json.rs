use async_trait::async_trait;
use llm_eval_core::{EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::metric::{finish, Metric, MetricMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IsJsonConfig {
    pub strict: bool,
    pub allow_empty: bool,
    pub expected_schema: Option<BTreeMap<String, String>>,
    pub min_keys: usize,
}

impl Default for IsJsonConfig {
    fn default() -> Self {
        Self {
            strict: true,
            allow_empty: false,
            expected_schema: None,
            min_keys: 0,
        }
    }
}

/// The upstream (ECMAScript) `typeof` of a parsed JSON value. Arrays and
/// null both report "object", which is exactly why strict mode carries a
/// separate array-rejection message.
pub fn json_typeof(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "object",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "object",
        serde_json::Value::Object(_) => "object",
    }
}

/// JSON well-formedness and shallow shape validation of the output.
///
/// Failure reasons accumulate in `details.validationErrors` instead of
/// short-circuiting; only an unparseable output stops early.
#[derive(Debug, Clone)]
pub struct IsJsonMetric {
    meta: MetricMeta,
    config: IsJsonConfig,
}

impl IsJsonMetric {
    pub fn new(meta: MetricMeta, config: IsJsonConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: IsJsonConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }
}

#[async_trait]
impl Metric for IsJsonMetric {
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

        let output = context.output.trim();
        if output.is_empty() {
            let result = if self.config.allow_empty {
                MetricResult::new(1.0, true, json!({ "empty": true, "validationErrors": [] }))
            } else {
                MetricResult::new(
                    0.0,
                    false,
                    json!({
                        "empty": true,
                        "validationErrors": ["output is empty"],
                    }),
                )
            };
            return Ok(finish(result, start));
        }

        let parsed: serde_json::Value = match serde_json::from_str(output) {
            Ok(value) => value,
            Err(e) => {
                // Parse failure short-circuits every other check.
                let result = MetricResult::new(
                    0.0,
                    false,
                    json!({
                        "parseError": e.to_string(),
                        "validationErrors": [format!("invalid JSON: {}", e)],
                    }),
                );
                return Ok(finish(result, start));
            }
        };

        let type_of = json_typeof(&parsed);
        let mut validation_errors: Vec<String> = Vec::new();
        let mut score = 1.0f64;

        if self.config.strict && !parsed.is_object() {
            if parsed.is_array() {
                validation_errors.push(
                    "strict mode: value is an array, not a JSON object (typeof reports 'object')"
                        .to_string(),
                );
            } else {
                validation_errors.push(format!(
                    "strict mode: expected a JSON object, got '{}'",
                    type_of
                ));
            }
            score = 0.0;
        }

        if let Some(object) = parsed.as_object() {
            let key_count = object.len();

            if self.config.min_keys > 0 && key_count < self.config.min_keys {
                validation_errors.push(format!(
                    "expected at least {} keys, found {}",
                    self.config.min_keys, key_count
                ));
                score *= key_count as f64 / self.config.min_keys as f64;
            }

            if let Some(schema) = &self.config.expected_schema {
                if !schema.is_empty() {
                    let mut matched = 0usize;
                    for (field, expected_type) in schema {
                        match object.get(field) {
                            Some(value) if json_typeof(value) == expected_type => matched += 1,
                            Some(value) => validation_errors.push(format!(
                                "field '{}' has type '{}', expected '{}'",
                                field,
                                json_typeof(value),
                                expected_type
                            )),
                            None => validation_errors
                                .push(format!("missing field '{}'", field)),
                        }
                    }
                    score *= matched as f64 / schema.len() as f64;
                }
            }
        }

        let passed = validation_errors.is_empty();
        let details = json!({
            "typeOf": type_of,
            "isArray": parsed.is_array(),
            "strict": self.config.strict,
            "validationErrors": validation_errors,
        });

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
