//! Typed error hierarchy for the bidforge engine.
//!
//! One enum per failure domain:
//! - `AgentError`: a single agent attempt failed (recovered locally, never fatal)
//! - `LookupError`: a reference lookup backend failed (degrades to empty results)
//! - `GateError`: a resume request violated the suspend/resume protocol
//! - `CheckpointError`: persistence failed or a workflow id is unknown
//! - `GraphError`: the workflow topology failed to compile
//! - `EngineError`: umbrella returned by the workflow engine

use crate::graph::NodeId;
use crate::phase::PhaseId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// A classified failure from one agent invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("agent timed out during {phase} after {elapsed_secs}s")]
    Timeout { phase: PhaseId, elapsed_secs: u64 },

    #[error("agent returned malformed output for {phase}: {reason}")]
    MalformedOutput { phase: PhaseId, reason: String },

    #[error("agent upstream failure during {phase}: {message}")]
    UpstreamFailure { phase: PhaseId, message: String },
}

impl AgentError {
    pub fn phase(&self) -> PhaseId {
        match self {
            Self::Timeout { phase, .. }
            | Self::MalformedOutput { phase, .. }
            | Self::UpstreamFailure { phase, .. } => *phase,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            Self::UpstreamFailure { .. } => ErrorKind::UpstreamFailure,
        }
    }
}

/// Classification stored in the workflow error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    MalformedOutput,
    UpstreamFailure,
    Lookup,
    RerunLimit,
    Invariant,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::MalformedOutput => "malformed_output",
            Self::UpstreamFailure => "upstream_failure",
            Self::Lookup => "lookup",
            Self::RerunLimit => "rerun_limit",
            Self::Invariant => "invariant",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("lookup query rejected: {0}")]
    InvalidQuery(String),
}

/// Violations of the suspend/resume protocol. The workflow is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateError {
    #[error("workflow {workflow_id} is not suspended at a gate (phase: {phase})")]
    NotSuspended { workflow_id: Uuid, phase: PhaseId },

    #[error("workflow {workflow_id} is suspended at gate {pending}, not gate {requested}")]
    GateMismatch {
        workflow_id: Uuid,
        pending: u8,
        requested: u8,
    },

    #[error("unknown gate id {0} (valid gates are 1-5)")]
    UnknownGate(u8),

    #[error("resume ticket {supplied} is stale for gate {gate}")]
    StaleTicket { gate: u8, supplied: Uuid },

    #[error("workflow {workflow_id} already finished ({phase})")]
    AlreadyTerminal { workflow_id: Uuid, phase: PhaseId },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no checkpoint found for workflow {0}")]
    NotFound(Uuid),

    #[error("checkpoint I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint backend unavailable: {0}")]
    Unavailable(String),
}

/// Topology errors raised while compiling the workflow graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node {0} declared twice")]
    DuplicateNode(NodeId),

    #[error("edge references undeclared node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} already has an outgoing edge")]
    ConflictingEdge(NodeId),

    #[error("node {0} has no outgoing edge")]
    MissingEdge(NodeId),

    #[error("node {0} is unreachable from the entry node")]
    Unreachable(NodeId),

    #[error("graph has no entry node")]
    MissingEntry,

    #[error("node {node} has no route for branch '{branch}'")]
    MissingBranch { node: NodeId, branch: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A programming invariant was broken; the workflow cannot continue.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_carries_phase_and_kind() {
        let err = AgentError::Timeout {
            phase: PhaseId::Plan,
            elapsed_secs: 300,
        };
        assert_eq!(err.phase(), PhaseId::Plan);
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_malformed_output_is_matchable() {
        let err = AgentError::MalformedOutput {
            phase: PhaseId::Research,
            reason: "no JSON object found".into(),
        };
        match &err {
            AgentError::MalformedOutput { reason, .. } => {
                assert_eq!(reason, "no JSON object found")
            }
            _ => panic!("Expected MalformedOutput"),
        }
        assert_eq!(err.kind().to_string(), "malformed_output");
    }

    #[test]
    fn test_engine_error_converts_from_gate_error() {
        let err: EngineError = GateError::UnknownGate(9).into();
        match err {
            EngineError::Gate(GateError::UnknownGate(id)) => assert_eq!(id, 9),
            other => panic!("Expected EngineError::Gate, got {other:?}"),
        }
    }

    #[test]
    fn test_checkpoint_not_found_mentions_workflow() {
        let id = Uuid::new_v4();
        let err = CheckpointError::NotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_gate_mismatch_message() {
        let err = GateError::GateMismatch {
            workflow_id: Uuid::nil(),
            pending: 3,
            requested: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("gate 3"));
        assert!(msg.contains("not gate 1"));
    }
}
