//! Fixed schemas for the four phase artifacts.
//!
//! Every artifact carries its own id and the id of its predecessor. Fields
//! hold derived summaries only; full outputs are reachable through the
//! `*_ref` fields, which point into `DomainState`.

use super::ArtifactId;
use crate::agent::outputs::{PersonnelAssignment, QualificationStatus, SectionAllocation, SectionPlan};
use crate::lookup::{ProposalSummary, ReferenceSummary};
use serde::{Deserialize, Serialize};

pub const MAX_REQUIREMENTS: usize = 20;
pub const MAX_PAST_PROPOSALS: usize = 5;
pub const MAX_CAPABILITIES: usize = 10;
pub const MAX_IMPLICIT_INTENT_CHARS: usize = 300;
pub const MAX_RISK_FACTORS: usize = 5;
pub const MAX_LANDSCAPE_CHARS: usize = 200;
pub const MAX_STRENGTHS: usize = 5;
pub const MAX_WEAKNESSES: usize = 5;
pub const MAX_CORE_MESSAGE_CHARS: usize = 200;
pub const MAX_WIN_THEMES: usize = 5;
pub const MAX_REFERENCES: usize = 5;
pub const MAX_SECTION_SUMMARY_CHARS: usize = 300;
/// Cap for title-like scalars such as the RFP title or client name.
pub const MAX_HEADER_CHARS: usize = 200;
/// Cap for each entry of a free-text list.
pub const MAX_ITEM_CHARS: usize = 300;

fn check_len<T>(violations: &mut Vec<String>, field: &str, items: &[T], max: usize) {
    if items.len() > max {
        violations.push(format!("{} has {} items (max {})", field, items.len(), max));
    }
}

fn check_chars(violations: &mut Vec<String>, field: &str, text: &str, max: usize) {
    let n = text.chars().count();
    if n > max {
        violations.push(format!("{} has {} chars (max {})", field, n, max));
    }
}

fn shorten(text: &mut String, max_chars: usize) {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
}

fn shorten_all(items: &mut [String], max_chars: usize) {
    for item in items {
        shorten(item, max_chars);
    }
}

/// Pop the last element of the longest list. Returns false when all are empty.
fn pop_longest(lists: &mut [&mut dyn Poppable]) -> bool {
    let Some(target) = lists
        .iter_mut()
        .filter(|l| l.length() > 0)
        .max_by_key(|l| l.length())
    else {
        return false;
    };
    target.pop_last();
    true
}

trait Poppable {
    fn length(&self) -> usize;
    fn pop_last(&mut self);
}

impl<T> Poppable for Vec<T> {
    fn length(&self) -> usize {
        self.len()
    }
    fn pop_last(&mut self) {
        self.pop();
    }
}

/// Artifact #1: parsed RFP plus gathered references (~8K tokens).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchArtifact {
    pub id: ArtifactId,
    /// Always `None`: research starts the chain.
    pub predecessor: Option<ArtifactId>,
    pub rfp_title: String,
    pub client_name: String,
    pub submission_deadline: String,
    pub budget_range: Option<String>,
    pub page_limit: Option<u32>,
    pub evaluation_method: String,
    pub requirements_summary: Vec<String>,
    pub evaluation_criteria: Vec<String>,
    pub past_proposals_summary: Vec<ProposalSummary>,
    pub competition_history: String,
    pub relevant_capabilities: Vec<String>,
    pub available_personnel_count: u32,
    pub rfp_document_ref: String,
    pub full_data_refs: Vec<String>,
}

impl ResearchArtifact {
    pub fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        if self.predecessor.is_some() {
            v.push("research artifact must not have a predecessor".to_string());
        }
        check_len(&mut v, "requirements_summary", &self.requirements_summary, MAX_REQUIREMENTS);
        check_len(&mut v, "past_proposals_summary", &self.past_proposals_summary, MAX_PAST_PROPOSALS);
        check_len(&mut v, "relevant_capabilities", &self.relevant_capabilities, MAX_CAPABILITIES);
        check_chars(&mut v, "rfp_title", &self.rfp_title, MAX_HEADER_CHARS);
        check_chars(&mut v, "client_name", &self.client_name, MAX_HEADER_CHARS);
        v
    }

    pub(crate) fn drop_one(&mut self) -> bool {
        pop_longest(&mut [
            &mut self.requirements_summary as &mut dyn Poppable,
            &mut self.evaluation_criteria as &mut dyn Poppable,
            &mut self.past_proposals_summary as &mut dyn Poppable,
            &mut self.relevant_capabilities as &mut dyn Poppable,
        ])
    }

    pub(crate) fn shorten_text(&mut self, max_chars: usize) {
        shorten(&mut self.rfp_title, max_chars);
        shorten(&mut self.client_name, max_chars);
        shorten(&mut self.submission_deadline, max_chars);
        if let Some(budget) = self.budget_range.as_mut() {
            shorten(budget, max_chars);
        }
        shorten(&mut self.evaluation_method, max_chars);
        shorten(&mut self.competition_history, max_chars);
        shorten_all(&mut self.requirements_summary, max_chars);
        shorten_all(&mut self.evaluation_criteria, max_chars);
        shorten_all(&mut self.relevant_capabilities, max_chars);
        for p in &mut self.past_proposals_summary {
            shorten(&mut p.title, max_chars);
            shorten(&mut p.client, max_chars);
            shorten(&mut p.status, max_chars);
        }
    }
}

/// Artifact #2: qualification and competitive analysis (~10K tokens).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub id: ArtifactId,
    pub predecessor: Option<ArtifactId>,
    pub evaluation_criteria: Vec<String>,
    pub mandatory_requirements: Vec<String>,
    pub implicit_intent: String,
    pub risk_factors: Vec<String>,
    pub client_priorities: Vec<String>,
    pub competitive_landscape: String,
    pub our_strengths: Vec<String>,
    pub our_weaknesses: Vec<String>,
    pub attack_strategy_hint: String,
    pub section_allocations: Vec<SectionAllocation>,
    pub total_target_pages: u32,
    pub qualification_status: QualificationStatus,
    pub qualification_gaps: Vec<String>,
    pub analysis_ref: String,
}

impl AnalysisArtifact {
    pub fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        if self.predecessor.is_none() {
            v.push("analysis artifact must reference the research artifact".to_string());
        }
        check_chars(&mut v, "implicit_intent", &self.implicit_intent, MAX_IMPLICIT_INTENT_CHARS);
        check_chars(&mut v, "competitive_landscape", &self.competitive_landscape, MAX_LANDSCAPE_CHARS);
        check_len(&mut v, "risk_factors", &self.risk_factors, MAX_RISK_FACTORS);
        check_len(&mut v, "our_strengths", &self.our_strengths, MAX_STRENGTHS);
        check_len(&mut v, "our_weaknesses", &self.our_weaknesses, MAX_WEAKNESSES);
        v
    }

    pub(crate) fn drop_one(&mut self) -> bool {
        pop_longest(&mut [
            &mut self.evaluation_criteria as &mut dyn Poppable,
            &mut self.mandatory_requirements as &mut dyn Poppable,
            &mut self.client_priorities as &mut dyn Poppable,
            &mut self.section_allocations as &mut dyn Poppable,
            &mut self.qualification_gaps as &mut dyn Poppable,
        ])
    }

    pub(crate) fn drop_core(&mut self) -> bool {
        pop_longest(&mut [
            &mut self.risk_factors as &mut dyn Poppable,
            &mut self.our_strengths as &mut dyn Poppable,
            &mut self.our_weaknesses as &mut dyn Poppable,
        ])
    }

    pub(crate) fn shorten_text(&mut self, max_chars: usize) {
        shorten(&mut self.implicit_intent, max_chars);
        shorten(&mut self.competitive_landscape, max_chars);
        shorten(&mut self.attack_strategy_hint, max_chars);
        shorten_all(&mut self.evaluation_criteria, max_chars);
        shorten_all(&mut self.mandatory_requirements, max_chars);
        shorten_all(&mut self.risk_factors, max_chars);
        shorten_all(&mut self.client_priorities, max_chars);
        shorten_all(&mut self.our_strengths, max_chars);
        shorten_all(&mut self.our_weaknesses, max_chars);
        shorten_all(&mut self.qualification_gaps, max_chars);
        for allocation in &mut self.section_allocations {
            shorten(&mut allocation.section, max_chars);
        }
    }
}

/// Artifact #3: the approved-to-be strategy (~12K tokens).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanArtifact {
    pub id: ArtifactId,
    pub predecessor: Option<ArtifactId>,
    pub core_message: String,
    pub win_themes: Vec<String>,
    pub differentiators: Vec<String>,
    pub section_plans: Vec<SectionPlan>,
    pub personnel_assignments: Vec<PersonnelAssignment>,
    pub language_guidelines: Vec<String>,
    pub generation_order: Vec<Vec<String>>,
    pub references: Vec<ReferenceSummary>,
    pub strategy_ref: String,
}

impl PlanArtifact {
    pub fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        if self.predecessor.is_none() {
            v.push("plan artifact must reference the analysis artifact".to_string());
        }
        check_chars(&mut v, "core_message", &self.core_message, MAX_CORE_MESSAGE_CHARS);
        check_len(&mut v, "win_themes", &self.win_themes, MAX_WIN_THEMES);
        for theme in &self.win_themes {
            check_chars(&mut v, "win theme", theme, MAX_ITEM_CHARS);
        }
        check_len(&mut v, "references", &self.references, MAX_REFERENCES);
        v
    }

    /// Sum of planned section pages.
    pub fn planned_pages(&self) -> u32 {
        self.section_plans.iter().map(|s| s.pages).sum()
    }

    pub(crate) fn drop_one(&mut self) -> bool {
        pop_longest(&mut [
            &mut self.differentiators as &mut dyn Poppable,
            &mut self.language_guidelines as &mut dyn Poppable,
            &mut self.personnel_assignments as &mut dyn Poppable,
            &mut self.references as &mut dyn Poppable,
        ])
    }

    pub(crate) fn drop_core(&mut self) -> bool {
        pop_longest(&mut [
            &mut self.section_plans as &mut dyn Poppable,
            &mut self.generation_order as &mut dyn Poppable,
            &mut self.win_themes as &mut dyn Poppable,
        ])
    }

    pub(crate) fn shorten_text(&mut self, max_chars: usize) {
        shorten(&mut self.core_message, max_chars);
        shorten_all(&mut self.win_themes, max_chars);
        shorten_all(&mut self.differentiators, max_chars);
        shorten_all(&mut self.language_guidelines, max_chars);
        for plan in &mut self.section_plans {
            shorten(&mut plan.name, max_chars);
            shorten(&mut plan.key_message, max_chars);
        }
        for batch in &mut self.generation_order {
            shorten_all(batch, max_chars);
        }
        for assignment in &mut self.personnel_assignments {
            shorten(&mut assignment.role, max_chars);
            shorten(&mut assignment.name, max_chars);
        }
        for reference in &mut self.references {
            shorten(&mut reference.title, max_chars);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub name: String,
    pub summary: String,
    pub pages: f32,
}

/// Artifact #4: drafted sections in summary form (~15K tokens).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementArtifact {
    pub id: ArtifactId,
    pub predecessor: Option<ArtifactId>,
    pub section_summaries: Vec<SectionSummary>,
    pub total_pages: f32,
    pub total_target_pages: u32,
    pub overall_traceability: f32,
    pub section_full_refs: Vec<String>,
    pub generation_notes: Vec<String>,
}

impl ImplementArtifact {
    pub fn violations(&self) -> Vec<String> {
        let mut v = Vec::new();
        if self.predecessor.is_none() {
            v.push("implement artifact must reference the plan artifact".to_string());
        }
        if !(0.0..=1.0).contains(&self.overall_traceability) {
            v.push(format!(
                "overall_traceability {} outside [0, 1]",
                self.overall_traceability
            ));
        }
        if self.total_pages < 0.0 || !self.total_pages.is_finite() {
            v.push(format!("total_pages {} is not a page count", self.total_pages));
        }
        for section in &self.section_summaries {
            check_chars(&mut v, "section summary", &section.summary, MAX_SECTION_SUMMARY_CHARS);
        }
        v
    }

    /// Relative deviation of drafted pages from the target, 0 when no target.
    pub fn page_deviation(&self) -> f32 {
        if self.total_target_pages == 0 {
            return 0.0;
        }
        let target = self.total_target_pages as f32;
        (self.total_pages - target).abs() / target.max(1.0)
    }

    pub(crate) fn drop_one(&mut self) -> bool {
        pop_longest(&mut [
            &mut self.generation_notes as &mut dyn Poppable,
            &mut self.section_full_refs as &mut dyn Poppable,
        ])
    }

    pub(crate) fn drop_core(&mut self) -> bool {
        pop_longest(&mut [&mut self.section_summaries as &mut dyn Poppable])
    }

    pub(crate) fn shorten_text(&mut self, max_chars: usize) {
        for section in &mut self.section_summaries {
            shorten(&mut section.name, max_chars);
            shorten(&mut section.summary, max_chars);
        }
        shorten_all(&mut self.generation_notes, max_chars);
    }
}
