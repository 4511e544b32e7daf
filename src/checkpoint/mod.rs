//! Checkpoint Persistence Interface.
//!
//! The engine saves the whole `WorkflowState` after every node. Saves may be
//! repeated (at-least-once); loading an unknown workflow is
//! `CheckpointError::NotFound`.

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use crate::errors::CheckpointError;
use crate::phase::PhaseId;
use crate::state::{RunStatus, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing entry for a stored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub workflow_id: Uuid,
    pub current_phase: PhaseId,
    pub status: RunStatus,
    pub suspended_gate: Option<u8>,
    pub updated_at: DateTime<Utc>,
    pub seq: u64,
}

impl CheckpointInfo {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            workflow_id: state.workflow_id,
            current_phase: state.current_phase,
            status: state.status(),
            suspended_gate: state.suspended.as_ref().map(|s| s.gate_id.number()),
            updated_at: state.updated_at,
            seq: state.checkpoint_seq,
        }
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, workflow_id: Uuid, state: &WorkflowState) -> Result<(), CheckpointError>;

    async fn load(&self, workflow_id: Uuid) -> Result<WorkflowState, CheckpointError>;

    /// Stored workflows, most recently updated first.
    async fn list(&self) -> Result<Vec<CheckpointInfo>, CheckpointError>;
}
