pub mod agent;
pub mod artifacts;
pub mod checkpoint;
pub mod compaction;
pub mod config;
pub mod errors;
pub mod executor;
pub mod gates;
pub mod graph;
pub mod init;
pub mod logging;
pub mod lookup;
pub mod phase;
pub mod quality;
pub mod state;
pub mod ui;

pub use errors::{AgentError, CheckpointError, EngineError, GateError};
pub use graph::{RunOutcome, WorkflowEngine};
pub use state::WorkflowState;
