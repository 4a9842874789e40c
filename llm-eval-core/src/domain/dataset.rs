use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of a dataset. Owned by the external dataset store; the engine
/// only reads these and derives an `EvaluationContext` from each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetItem {
    pub id: Uuid,
    pub input_data: serde_json::Value,
    pub expected_output: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl DatasetItem {
    pub fn new(
        input_data: serde_json::Value,
        expected_output: Option<serde_json::Value>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_data,
            expected_output,
            metadata,
        }
    }
}
