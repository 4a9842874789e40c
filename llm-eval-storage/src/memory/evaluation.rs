use async_trait::async_trait;
use dashmap::DashMap;
use llm_eval_core::{EvaluationDefinition, EvaluationStore, Result};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryEvaluationStore {
    evaluations: DashMap<Uuid, EvaluationDefinition>,
}

impl InMemoryEvaluationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_evaluation(&self, definition: EvaluationDefinition) {
        self.evaluations.insert(definition.id, definition);
    }
}

#[async_trait]
impl EvaluationStore for InMemoryEvaluationStore {
    async fn find_evaluation(&self, id: &Uuid) -> Result<Option<EvaluationDefinition>> {
        Ok(self.evaluations.get(id).map(|def| def.clone()))
    }
}
