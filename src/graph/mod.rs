//! Workflow Graph.
//!
//! The proposal pipeline is a fixed topology of sixteen nodes: an executor,
//! a compressor and a gate for each of the four artifact-producing phases,
//! followed by the critique/revise/finalize loop and the final gate.
//!
//! ```text
//! research -> compress_research -> gate1 -> analysis -> ... -> gate4
//!     -> critique --pass--> finalize -> gate5
//!            |  ^ --escalate--------------^
//!         revise
//! ```
//!
//! [`workflow_graph`] declares and validates the topology; [`WorkflowEngine`]
//! walks it one node at a time, checkpointing after every node and parking
//! the run whenever a gate needs a human.

pub mod builder;
pub mod engine;
pub mod node;

pub use builder::{Branch, CompiledGraph, GraphBuilder, Target, workflow_graph};
pub use engine::{
    DEFAULT_MAX_PHASE_RETRIES, DEFAULT_MAX_REJECTION_RERUNS, EngineSettings, RunOutcome,
    WorkflowEngine, WorkflowEvent, validate_resume,
};
pub use node::{NodeId, NodeKind};
