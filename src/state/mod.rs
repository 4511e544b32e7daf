//! The workflow state threaded through every node.
//!
//! `WorkflowState` is the single authoritative record of one run. The engine
//! owns it exclusively; the executor, compressor and gate evaluator receive
//! borrowed snapshots and hand back values the engine merges.
//!
//! Three areas hold phase data with very different lifetimes:
//! - `artifacts`: the bounded, write-once chain phases read from
//! - `working_state`: scratch space of the running phase, emptied by compression
//! - `domain_state`: full outputs kept for downstream consumers, never cleared
//!   and never fed back into an agent call

pub mod records;
pub mod working;

pub use records::{DecisionRecord, ErrorRecord, HitlRecord, LogEntry, UsageLedger, UsageRecord};
pub use working::{
    AnalysisWorking, ImplementWorking, PlanWorking, QualityWorking, ResearchWorking, WorkingState,
};

use crate::agent::outputs::{
    AnalysisOutput, CritiqueOutput, FinalizeOutput, ImplementOutput, PlanOutput, ResearchOutput,
    RevisionOutput,
};
use crate::artifacts::{ArtifactChain, PhaseArtifact};
use crate::errors::ErrorKind;
use crate::gates::SuspendPayload;
use crate::graph::NodeId;
use crate::lookup::{Person, ProposalSummary, ReferenceSummary};
use crate::phase::PhaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Raw inputs supplied when a workflow is started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Extracted RFP text. Empty when extraction failed.
    pub rfp_text: String,
    /// Where the RFP came from, kept as an opaque reference.
    pub rfp_ref: String,
    #[serde(default)]
    pub company_profile: Option<String>,
}

/// Full-fidelity phase outputs, kept for rendering and audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainState {
    pub research: Option<ResearchOutput>,
    pub similar_proposals: Vec<ProposalSummary>,
    pub analysis: Option<AnalysisOutput>,
    pub plan: Option<PlanOutput>,
    pub allocated_personnel: Vec<Person>,
    pub references: Vec<ReferenceSummary>,
    pub implement: Option<ImplementOutput>,
    pub critiques: Vec<CritiqueOutput>,
    pub revisions: Vec<RevisionOutput>,
    pub finalized: Option<FinalizeOutput>,
}

impl DomainState {
    /// Opaque reference for the full output of `phase`.
    pub fn reference(phase: PhaseId) -> String {
        format!("domain_state/{}", phase)
    }
}

/// The only inputs besides the prior artifact that reach an agent call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainContext {
    /// RFP text, handed to research only.
    pub rfp_text: Option<String>,
    pub company_profile: Option<String>,
    /// Human feedback from a rejected gate, when this is a re-run.
    pub feedback: Option<String>,
}

impl DomainContext {
    /// Build the context for `phase`. Reads the run input and feedback,
    /// never `domain_state`.
    pub fn for_phase(phase: PhaseId, input: &WorkflowInput, feedback: Option<String>) -> Self {
        Self {
            rfp_text: (phase == PhaseId::Research).then(|| input.rfp_text.clone()),
            company_profile: input.company_profile.clone(),
            feedback,
        }
    }
}

/// Coarse lifecycle status derived from the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub express_mode: bool,
    pub current_phase: PhaseId,
    /// Next node to execute. `None` once the run is terminal.
    pub cursor: Option<NodeId>,
    /// Present while parked at a gate.
    #[serde(default)]
    pub suspended: Option<SuspendPayload>,
    #[serde(default)]
    pub failure: Option<String>,
    pub input: WorkflowInput,
    pub artifacts: ArtifactChain,
    /// Artifact produced by the last compression, awaiting its gate.
    #[serde(default)]
    pub staged_artifact: Option<PhaseArtifact>,
    #[serde(default)]
    pub working_state: WorkingState,
    #[serde(default)]
    pub domain_state: DomainState,
    /// Feedback to inject into the next re-run of a phase.
    #[serde(default)]
    pub pending_feedback: Option<String>,
    #[serde(default)]
    pub hitl_log: Vec<HitlRecord>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    /// Graph-level retries of degraded agent attempts.
    #[serde(default)]
    pub retry_count: u32,
    /// Attempts of the node at the cursor, reset when the cursor moves on.
    #[serde(default)]
    pub node_attempts: u32,
    /// Human-driven re-runs, per phase.
    #[serde(default)]
    pub rerun_counts: BTreeMap<PhaseId, u32>,
    #[serde(default)]
    pub decisions: Vec<DecisionRecord>,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    #[serde(default)]
    pub usage: UsageLedger,
    /// Number of checkpoints written for this run.
    #[serde(default)]
    pub checkpoint_seq: u64,
}

impl WorkflowState {
    pub fn new(input: WorkflowInput, express_mode: bool) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            express_mode,
            current_phase: PhaseId::Research,
            cursor: Some(NodeId::Research),
            suspended: None,
            failure: None,
            input,
            artifacts: ArtifactChain::default(),
            staged_artifact: None,
            working_state: WorkingState::Empty,
            domain_state: DomainState::default(),
            pending_feedback: None,
            hitl_log: Vec::new(),
            errors: Vec::new(),
            retry_count: 0,
            node_attempts: 0,
            rerun_counts: BTreeMap::new(),
            decisions: Vec::new(),
            log: Vec::new(),
            usage: UsageLedger::default(),
            checkpoint_seq: 0,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self.current_phase {
            PhaseId::Completed => RunStatus::Completed,
            PhaseId::Error => RunStatus::Failed,
            _ if self.suspended.is_some() => RunStatus::Suspended,
            _ => RunStatus::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current_phase.is_terminal()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn push_log(&mut self, node: NodeId, message: impl Into<String>) {
        self.log.push(LogEntry {
            node,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn push_error(&mut self, node: NodeId, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(ErrorRecord {
            node,
            kind,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn push_decision(&mut self, node: NodeId, decision: impl Into<String>) {
        self.decisions.push(DecisionRecord {
            node,
            decision: decision.into(),
            at: Utc::now(),
        });
    }

    /// The gate record awaiting a human response, if any.
    pub fn pending_hitl(&self) -> Option<&HitlRecord> {
        self.hitl_log.iter().rev().find(|r| r.is_pending())
    }

    pub fn pending_hitl_mut(&mut self) -> Option<&mut HitlRecord> {
        self.hitl_log.iter_mut().rev().find(|r| r.is_pending())
    }

    /// Park the run in `Error`.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.current_phase = PhaseId::Error;
        self.cursor = None;
        self.suspended = None;
        self.failure = Some(reason.into());
        self.touch();
    }

    pub fn complete(&mut self) {
        self.current_phase = PhaseId::Completed;
        self.cursor = None;
        self.suspended = None;
        self.working_state = WorkingState::Empty;
        self.touch();
    }
}
