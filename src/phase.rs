//! Pipeline phases and their static properties.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The active phase of a workflow.
///
/// The first four values produce an artifact each; `Critique`, `Revise` and
/// `Finalize` make up the terminal quality phase. `Completed` and `Error` are
/// terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    #[default]
    Research,
    Analysis,
    Plan,
    Implement,
    Critique,
    Revise,
    Finalize,
    Completed,
    Error,
}

impl PhaseId {
    /// Phases that call the agent, in pipeline order.
    pub const EXECUTABLE: [PhaseId; 7] = [
        PhaseId::Research,
        PhaseId::Analysis,
        PhaseId::Plan,
        PhaseId::Implement,
        PhaseId::Critique,
        PhaseId::Revise,
        PhaseId::Finalize,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether this phase belongs to the critique/revise/finalize loop.
    pub fn is_quality_phase(&self) -> bool {
        matches!(self, Self::Critique | Self::Revise | Self::Finalize)
    }

    /// Pipeline position (1-5). The three quality sub-steps all map to 5.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Research => Some(1),
            Self::Analysis => Some(2),
            Self::Plan => Some(3),
            Self::Implement => Some(4),
            Self::Critique | Self::Revise | Self::Finalize => Some(5),
            Self::Completed | Self::Error => None,
        }
    }

    /// Artifact slot (1-4) this phase's compression step produces.
    pub fn artifact_slot(&self) -> Option<usize> {
        match self {
            Self::Research => Some(1),
            Self::Analysis => Some(2),
            Self::Plan => Some(3),
            Self::Implement => Some(4),
            _ => None,
        }
    }

    /// Artifact slot this phase reads as its input, if any.
    pub fn input_slot(&self) -> Option<usize> {
        match self {
            Self::Research => None,
            Self::Analysis => Some(1),
            Self::Plan => Some(2),
            Self::Implement => Some(3),
            Self::Critique | Self::Revise | Self::Finalize => Some(4),
            Self::Completed | Self::Error => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Research => "Research (RFP parsing)",
            Self::Analysis => "Analysis (qualification & competition)",
            Self::Plan => "Plan (strategy)",
            Self::Implement => "Implement (section drafting)",
            Self::Critique => "Critique (quality review)",
            Self::Revise => "Revise (section revision)",
            Self::Finalize => "Finalize (final assembly)",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Critique => "critique",
            Self::Revise => "revise",
            Self::Finalize => "finalize",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for PhaseId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "research" => Ok(Self::Research),
            "analysis" => Ok(Self::Analysis),
            "plan" => Ok(Self::Plan),
            "implement" => Ok(Self::Implement),
            "critique" => Ok(Self::Critique),
            "revise" => Ok(Self::Revise),
            "finalize" => Ok(Self::Finalize),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: research, analysis, plan, implement, critique, revise, finalize, completed, error",
                s
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(PhaseId::Completed.is_terminal());
        assert!(PhaseId::Error.is_terminal());
        assert!(!PhaseId::Finalize.is_terminal());
    }

    #[test]
    fn test_artifact_slots_follow_pipeline_order() {
        let slots: Vec<_> = PhaseId::EXECUTABLE
            .iter()
            .filter_map(|p| p.artifact_slot())
            .collect();
        assert_eq!(slots, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_input_slot_is_previous_artifact() {
        for phase in [PhaseId::Analysis, PhaseId::Plan, PhaseId::Implement] {
            let out = phase.artifact_slot().unwrap();
            assert_eq!(phase.input_slot(), Some(out - 1));
        }
        assert_eq!(PhaseId::Research.input_slot(), None);
        assert_eq!(PhaseId::Revise.input_slot(), Some(4));
    }

    #[test]
    fn test_phase_serde_is_snake_case() {
        let json = serde_json::to_string(&PhaseId::Implement).unwrap();
        assert_eq!(json, "\"implement\"");
        let parsed: PhaseId = "Critique".parse().unwrap();
        assert_eq!(parsed, PhaseId::Critique);
        assert!("drafting".parse::<PhaseId>().is_err());
    }
}
