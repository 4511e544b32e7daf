//! Structured outputs returned by the agent, one schema per phase.
//!
//! These are the full-fidelity results. They live in the working area while
//! their phase runs and are moved into `DomainState` at compression time.

use crate::lookup::ProposalSummary;
use crate::phase::PhaseId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    #[serde(default)]
    pub rfp_title: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub submission_deadline: String,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub page_limit: Option<u32>,
    #[serde(default)]
    pub evaluation_method: String,
    #[serde(default)]
    pub mandatory_requirements: Vec<String>,
    #[serde(default)]
    pub optional_requirements: Vec<String>,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    #[serde(default)]
    pub competition_history: String,
    #[serde(default)]
    pub relevant_capabilities: Vec<String>,
    #[serde(default)]
    pub available_personnel_count: u32,
    /// Past proposals the agent identified itself, merged with lookup results.
    #[serde(default)]
    pub past_proposals: Vec<ProposalSummary>,
}

/// Bid qualification verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationStatus {
    #[default]
    Met,
    Conditional,
    Unmet,
}

impl QualificationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Met => "충족",
            Self::Conditional => "조건부",
            Self::Unmet => "미충족",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionAllocation {
    pub section: String,
    #[serde(default)]
    pub pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    #[serde(default)]
    pub qualification_status: QualificationStatus,
    #[serde(default)]
    pub qualification_gaps: Vec<String>,
    #[serde(default)]
    pub our_strengths: Vec<String>,
    #[serde(default)]
    pub our_weaknesses: Vec<String>,
    #[serde(default)]
    pub competitive_landscape: String,
    #[serde(default)]
    pub recommended_strategy: String,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub implicit_intent: String,
    #[serde(default)]
    pub client_priorities: Vec<String>,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    #[serde(default)]
    pub mandatory_requirements: Vec<String>,
    #[serde(default)]
    pub section_allocations: Vec<SectionAllocation>,
    #[serde(default)]
    pub total_target_pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonnelAssignment {
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub name: String,
    #[serde(default)]
    pub key_message: String,
    #[serde(default)]
    pub pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOutput {
    #[serde(default)]
    pub core_message: String,
    #[serde(default)]
    pub win_themes: Vec<String>,
    #[serde(default)]
    pub differentiators: Vec<String>,
    #[serde(default)]
    pub personnel_assignments: Vec<PersonnelAssignment>,
    #[serde(default)]
    pub section_plans: Vec<SectionPlan>,
    /// Batches of section names that can be drafted together.
    #[serde(default)]
    pub generation_order: Vec<Vec<String>>,
    #[serde(default)]
    pub language_guidelines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub pages: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementOutput {
    #[serde(default)]
    pub sections: Vec<DraftSection>,
    #[serde(default)]
    pub total_pages: f32,
    #[serde(default)]
    pub required_claims: Vec<String>,
    /// Share of requirements traced to a section, in `[0, 1]`.
    #[serde(default)]
    pub traceability: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CritiqueOutput {
    pub quality_score: f32,
    #[serde(default)]
    pub critique: String,
    /// Structural problems; any entry forces escalation.
    #[serde(default)]
    pub major_issues: Vec<String>,
    #[serde(default)]
    pub minor_issues: Vec<String>,
    #[serde(default)]
    pub revision_recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionOutput {
    /// Re-evaluated score. When absent the fallback nudge applies.
    #[serde(default)]
    pub quality_score: Option<f32>,
    #[serde(default)]
    pub revised_sections: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizeOutput {
    #[serde(default)]
    pub executive_summary: String,
    /// Opaque reference to the rendered document in the external store.
    #[serde(default)]
    pub document_ref: String,
}

/// A phase-specific structured result.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    Research(ResearchOutput),
    Analysis(AnalysisOutput),
    Plan(PlanOutput),
    Implement(ImplementOutput),
    Critique(CritiqueOutput),
    Revision(RevisionOutput),
    Finalize(FinalizeOutput),
}

impl AgentOutput {
    /// The phase this output answers.
    pub fn phase(&self) -> PhaseId {
        match self {
            Self::Research(_) => PhaseId::Research,
            Self::Analysis(_) => PhaseId::Analysis,
            Self::Plan(_) => PhaseId::Plan,
            Self::Implement(_) => PhaseId::Implement,
            Self::Critique(_) => PhaseId::Critique,
            Self::Revision(_) => PhaseId::Revise,
            Self::Finalize(_) => PhaseId::Finalize,
        }
    }

    /// Decode a JSON value against the schema for `phase`.
    pub fn from_value(phase: PhaseId, value: serde_json::Value) -> Result<Self, String> {
        let decoded = match phase {
            PhaseId::Research => serde_json::from_value(value).map(Self::Research),
            PhaseId::Analysis => serde_json::from_value(value).map(Self::Analysis),
            PhaseId::Plan => serde_json::from_value(value).map(Self::Plan),
            PhaseId::Implement => serde_json::from_value(value).map(Self::Implement),
            PhaseId::Critique => serde_json::from_value(value).map(Self::Critique),
            PhaseId::Revise => serde_json::from_value(value).map(Self::Revision),
            PhaseId::Finalize => serde_json::from_value(value).map(Self::Finalize),
            PhaseId::Completed | PhaseId::Error => {
                return Err(format!("phase {} has no output schema", phase));
            }
        };
        let output = decoded.map_err(|e| e.to_string())?;
        output.validate()?;
        Ok(output)
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Implement(out) => {
                unit_interval("traceability", out.traceability)?;
                if out.total_pages < 0.0 || !out.total_pages.is_finite() {
                    return Err(format!("total_pages must be >= 0, got {}", out.total_pages));
                }
                Ok(())
            }
            Self::Critique(out) => unit_interval("quality_score", out.quality_score),
            Self::Revision(out) => match out.quality_score {
                Some(score) => unit_interval("quality_score", score),
                None => Ok(()),
            },
            Self::Plan(out) if out.core_message.trim().is_empty() => {
                Err("core_message must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

fn unit_interval(field: &str, value: f32) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be within [0, 1], got {}", field, value))
    }
}
