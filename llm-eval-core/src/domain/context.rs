use serde::{Deserialize, Serialize};

use super::dataset::DatasetItem;

/// Input to every metric evaluation. Constructed fresh per dataset item,
/// immutable for the duration of the call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub input: String,
    pub output: String,
    pub expected_output: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl EvaluationContext {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            expected_output: None,
            metadata: None,
        }
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Derive a context from a dataset item.
    ///
    /// `input` is the raw payload if it is already a string; for objects the
    /// first present of `input`/`prompt`/`text` wins, with a JSON-stringified
    /// fallback of the whole payload. `output` is empty unless the payload is
    /// an object exposing `output`/`response`/`result`. `expected_output`
    /// passes through unchanged.
    pub fn from_item(item: &DatasetItem) -> Self {
        let input = match &item.input_data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => first_string(map, &["input", "prompt", "text"])
                .unwrap_or_else(|| item.input_data.to_string()),
            other => other.to_string(),
        };

        let output = match &item.input_data {
            serde_json::Value::Object(map) => {
                first_string(map, &["output", "response", "result"]).unwrap_or_default()
            }
            _ => String::new(),
        };

        let expected_output = item.expected_output.as_ref().map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        Self {
            input,
            output,
            expected_output,
            metadata: item.metadata.clone(),
        }
    }
}

fn first_string(map: &serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        map.get(*key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    })
}
