//! Per-phase scratch space.
//!
//! Only the phase currently running owns a working area. Its contents are
//! consumed by compression (or by the final gate) and then cleared, so no
//! later phase can read another phase's raw output.

use crate::agent::outputs::{
    AnalysisOutput, CritiqueOutput, FinalizeOutput, ImplementOutput, PlanOutput, ResearchOutput,
};
use crate::artifacts::ArtifactId;
use crate::lookup::{Person, ProposalSummary, ReferenceSummary};
use crate::phase::PhaseId;
use crate::quality::{QualityLoopState, QualityRoute};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchWorking {
    pub output: Option<ResearchOutput>,
    pub similar_proposals: Vec<ProposalSummary>,
    pub rfp_ref: String,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWorking {
    pub output: Option<AnalysisOutput>,
    pub predecessor: ArtifactId,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanWorking {
    pub output: Option<PlanOutput>,
    pub allocated_personnel: Vec<Person>,
    pub references: Vec<ReferenceSummary>,
    pub predecessor: ArtifactId,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementWorking {
    pub output: Option<ImplementOutput>,
    /// Planned page total carried over from the strategy.
    pub target_pages: u32,
    pub predecessor: ArtifactId,
    pub feedback: Option<String>,
}

/// Critique, revise and finalize share one working area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityWorking {
    pub loop_state: QualityLoopState,
    pub critique: Option<CritiqueOutput>,
    pub finalized: Option<FinalizeOutput>,
    pub route: Option<QualityRoute>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkingState {
    #[default]
    Empty,
    Research(ResearchWorking),
    Analysis(AnalysisWorking),
    Plan(PlanWorking),
    Implement(ImplementWorking),
    Quality(QualityWorking),
}

impl WorkingState {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Phase that owns the current contents, `None` when empty.
    pub fn owner(&self) -> Option<PhaseId> {
        match self {
            Self::Empty => None,
            Self::Research(_) => Some(PhaseId::Research),
            Self::Analysis(_) => Some(PhaseId::Analysis),
            Self::Plan(_) => Some(PhaseId::Plan),
            Self::Implement(_) => Some(PhaseId::Implement),
            Self::Quality(_) => Some(PhaseId::Critique),
        }
    }

    pub fn quality(&self) -> Option<&QualityWorking> {
        match self {
            Self::Quality(q) => Some(q),
            _ => None,
        }
    }

    pub fn quality_mut(&mut self) -> Option<&mut QualityWorking> {
        match self {
            Self::Quality(q) => Some(q),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let w = WorkingState::default();
        assert!(w.is_empty());
        assert_eq!(w.owner(), None);
    }

    #[test]
    fn test_quality_area_is_owned_by_critique() {
        let w = WorkingState::Quality(QualityWorking::default());
        assert_eq!(w.owner(), Some(PhaseId::Critique));
        assert!(w.quality().is_some());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let w = WorkingState::Plan(PlanWorking::default());
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "plan");
    }
}
