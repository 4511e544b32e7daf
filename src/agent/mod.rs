//! Agent Invocation Port.
//!
//! The engine reaches every generative capability through [`AgentPort`]. One
//! call answers one phase attempt: the phase id, the prior artifact, the
//! phase's domain context and (for the quality phases) the loop state go in;
//! a typed [`AgentOutput`] or a classified [`AgentError`] comes out.

pub mod claude;
pub mod offline;
pub mod outputs;
pub mod parse;

pub use claude::ClaudeAgent;
pub use offline::OfflineAgent;
pub use outputs::AgentOutput;

use crate::artifacts::PhaseArtifact;
use crate::errors::AgentError;
use crate::phase::PhaseId;
use crate::quality::QualityLoopState;
use crate::state::DomainContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything an agent sees for one phase attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRequest {
    pub phase: PhaseId,
    /// Artifact of the immediately preceding phase, `None` for research.
    pub input_artifact: Option<PhaseArtifact>,
    pub context: DomainContext,
    /// Loop state for critique, revise and finalize.
    pub quality: Option<QualityLoopState>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub output: AgentOutput,
    pub usage: Option<TokenUsage>,
}

impl AgentResponse {
    pub fn new(output: AgentOutput) -> Self {
        Self {
            output,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[async_trait]
pub trait AgentPort: Send + Sync {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, AgentError>;
}
