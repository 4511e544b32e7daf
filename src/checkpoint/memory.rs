use super::{CheckpointInfo, CheckpointStore};
use crate::errors::CheckpointError;
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store. States are kept serialized so a load always returns
/// an independent copy, the same as reading back from disk.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, workflow_id: Uuid, state: &WorkflowState) -> Result<(), CheckpointError> {
        let encoded = serde_json::to_string(state)?;
        self.states.write().await.insert(workflow_id, encoded);
        Ok(())
    }

    async fn load(&self, workflow_id: Uuid) -> Result<WorkflowState, CheckpointError> {
        let states = self.states.read().await;
        let encoded = states
            .get(&workflow_id)
            .ok_or(CheckpointError::NotFound(workflow_id))?;
        Ok(serde_json::from_str(encoded)?)
    }

    async fn list(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let states = self.states.read().await;
        let mut infos = states
            .values()
            .map(|encoded| {
                serde_json::from_str::<WorkflowState>(encoded).map(|s| CheckpointInfo::from_state(&s))
            })
            .collect::<Result<Vec<_>, _>>()?;
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(infos)
    }
}
