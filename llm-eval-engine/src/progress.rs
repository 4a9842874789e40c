use llm_eval_core::EvaluationProgress;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

/// At-most-one callback per run id; registering again replaces the previous
/// one.
pub type ProgressCallback = Arc<dyn Fn(EvaluationProgress) + Send + Sync>;

/// Live progress for active runs, one `watch` channel per run.
///
/// The run's own execution task is the only writer of its entry (the stop
/// operation is the single documented exception); readers take snapshots or
/// subscribe to the channel. Entries outlive the run by a grace window so
/// late polls still resolve, then are discarded.
#[derive(Default)]
pub struct ProgressTracker {
    entries: RwLock<HashMap<Uuid, watch::Sender<EvaluationProgress>>>,
    callbacks: RwLock<HashMap<Uuid, ProgressCallback>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, progress: EvaluationProgress) {
        let (tx, _rx) = watch::channel(progress.clone());
        self.entries.write().await.insert(progress.run_id, tx);
    }

    /// Mutate a run's progress and notify the channel and callback.
    /// Returns the post-mutation snapshot, or None for untracked runs.
    pub async fn update<F>(&self, run_id: &Uuid, mutate: F) -> Option<EvaluationProgress>
    where
        F: FnOnce(&mut EvaluationProgress),
    {
        let entries = self.entries.read().await;
        let tx = entries.get(run_id)?;
        tx.send_modify(mutate);
        let snapshot = tx.borrow().clone();
        drop(entries);

        if let Some(callback) = self.callbacks.read().await.get(run_id) {
            callback(snapshot.clone());
        }

        Some(snapshot)
    }

    pub async fn get(&self, run_id: &Uuid) -> Option<EvaluationProgress> {
        let entries = self.entries.read().await;
        entries.get(run_id).map(|tx| tx.borrow().clone())
    }

    pub async fn subscribe(&self, run_id: &Uuid) -> Option<watch::Receiver<EvaluationProgress>> {
        let entries = self.entries.read().await;
        entries.get(run_id).map(|tx| tx.subscribe())
    }

    pub async fn is_running(&self, run_id: &Uuid) -> bool {
        self.get(run_id)
            .await
            .map(|p| p.status.is_running())
            .unwrap_or(false)
    }

    pub async fn set_callback(&self, run_id: Uuid, callback: ProgressCallback) {
        self.callbacks.write().await.insert(run_id, callback);
    }

    pub async fn remove(&self, run_id: &Uuid) {
        self.entries.write().await.remove(run_id);
        self.callbacks.write().await.remove(run_id);
    }
}
