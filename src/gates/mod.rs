//! Human-in-the-loop gates.
//!
//! Five gates sit between phases. Gates 1, 2 and 4 are conditional and
//! evaluate thresholds on the artifact just produced; gates 3 (strategy) and
//! 5 (final approval) always require a human. Express mode forces the
//! conditional gates to auto-pass and leaves the mandatory ones alone.
//!
//! Whenever a decision is not `auto_pass` the engine parks the workflow at
//! the gate and hands a [`SuspendPayload`] to the driving application, which
//! later answers with a [`HumanResponse`].

pub mod evaluate;
pub mod prompt;
pub mod summary;

pub use evaluate::{GatePolicy, evaluate_gate};
pub use prompt::{prompt_for_response, render_payload};

use crate::errors::GateError;
use crate::phase::PhaseId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One of the five gates, serialized as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GateId {
    Research,
    Analysis,
    Strategy,
    Draft,
    Final,
}

impl GateId {
    pub const ALL: [GateId; 5] = [
        GateId::Research,
        GateId::Analysis,
        GateId::Strategy,
        GateId::Draft,
        GateId::Final,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Self::Research => 1,
            Self::Analysis => 2,
            Self::Strategy => 3,
            Self::Draft => 4,
            Self::Final => 5,
        }
    }

    /// Mandatory gates always suspend, express mode included.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Strategy | Self::Final)
    }

    /// The phase re-run when a human rejects this gate with feedback.
    pub fn rerun_phase(&self) -> PhaseId {
        match self {
            Self::Research => PhaseId::Research,
            Self::Analysis => PhaseId::Analysis,
            Self::Strategy => PhaseId::Plan,
            Self::Draft => PhaseId::Implement,
            Self::Final => PhaseId::Critique,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Research => "RFP research review",
            Self::Analysis => "Qualification review",
            Self::Strategy => "Strategy approval",
            Self::Draft => "Draft review",
            Self::Final => "Final approval",
        }
    }
}

impl From<GateId> for u8 {
    fn from(gate: GateId) -> u8 {
        gate.number()
    }
}

impl TryFrom<u8> for GateId {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Research),
            2 => Ok(Self::Analysis),
            3 => Ok(Self::Strategy),
            4 => Ok(Self::Draft),
            5 => Ok(Self::Final),
            other => Err(GateError::UnknownGate(other)),
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate #{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    AutoPass,
    RecommendHuman,
    RequireHuman,
}

impl GateAction {
    pub fn suspends(&self) -> bool {
        !matches!(self, Self::AutoPass)
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoPass => write!(f, "auto_pass"),
            Self::RecommendHuman => write!(f, "recommend_human"),
            Self::RequireHuman => write!(f, "require_human"),
        }
    }
}

/// The outcome of evaluating a gate. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlDecision {
    pub gate_id: GateId,
    pub action: GateAction,
    pub reason: String,
    pub summary: String,
    pub approval_items: Vec<String>,
}

impl HitlDecision {
    pub fn auto_pass(gate_id: GateId, reason: impl Into<String>) -> Self {
        Self {
            gate_id,
            action: GateAction::AutoPass,
            reason: reason.into(),
            summary: String::new(),
            approval_items: Vec::new(),
        }
    }

    pub fn human(
        gate_id: GateId,
        action: GateAction,
        reason: impl Into<String>,
        summary: impl Into<String>,
        approval_items: &[&str],
    ) -> Self {
        Self {
            gate_id,
            action,
            reason: reason.into(),
            summary: summary.into(),
            approval_items: approval_items.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What the driving application receives when a workflow parks at a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendPayload {
    pub gate_id: GateId,
    pub action: GateAction,
    pub summary: String,
    pub approval_items: Vec<String>,
    pub reason: String,
    /// Identifies this particular suspension; a resume naming another ticket is stale.
    pub ticket: Uuid,
}

impl SuspendPayload {
    pub fn from_decision(decision: &HitlDecision, ticket: Uuid) -> Self {
        Self {
            gate_id: decision.gate_id,
            action: decision.action,
            summary: decision.summary.clone(),
            approval_items: decision.approval_items.clone(),
            reason: decision.reason.clone(),
            ticket,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanResponse {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl HumanResponse {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: None,
        }
    }

    pub fn reject(feedback: Option<&str>) -> Self {
        Self {
            approved: false,
            feedback: feedback.map(str::to_string),
        }
    }

    /// Non-blank feedback, if any.
    pub fn feedback_text(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }

    /// A rejection carrying feedback asks for the preceding phase to run again.
    pub fn requests_rerun(&self) -> bool {
        !self.approved && self.feedback_text().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_numbers_roundtrip() {
        for gate in GateId::ALL {
            assert_eq!(GateId::try_from(gate.number()).unwrap(), gate);
        }
        assert_eq!(GateId::try_from(0), Err(GateError::UnknownGate(0)));
        assert_eq!(GateId::try_from(6), Err(GateError::UnknownGate(6)));
    }

    #[test]
    fn test_only_strategy_and_final_are_mandatory() {
        let mandatory: Vec<u8> = GateId::ALL
            .iter()
            .filter(|g| g.is_mandatory())
            .map(|g| g.number())
            .collect();
        assert_eq!(mandatory, vec![3, 5]);
    }

    #[test]
    fn test_gate_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&GateId::Draft).unwrap(), "4");
        let parsed: GateId = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, GateId::Analysis);
        assert!(serde_json::from_str::<GateId>("7").is_err());
    }

    #[test]
    fn test_blank_feedback_does_not_request_rerun() {
        assert!(!HumanResponse::reject(Some("   ")).requests_rerun());
        assert!(!HumanResponse::reject(None).requests_rerun());
        assert!(HumanResponse::reject(Some("retry")).requests_rerun());
        assert!(!HumanResponse::approve().requests_rerun());
    }

    #[test]
    fn test_rerun_targets() {
        assert_eq!(GateId::Research.rerun_phase(), PhaseId::Research);
        assert_eq!(GateId::Strategy.rerun_phase(), PhaseId::Plan);
        assert_eq!(GateId::Final.rerun_phase(), PhaseId::Critique);
    }
}
