//! Token budgets per artifact and the fitting loop.

use crate::artifacts::PhaseArtifact;
use crate::phase::PhaseId;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RESEARCH_TOKENS: usize = 8_000;
pub const DEFAULT_ANALYSIS_TOKENS: usize = 10_000;
pub const DEFAULT_PLAN_TOKENS: usize = 12_000;
pub const DEFAULT_IMPLEMENT_TOKENS: usize = 15_000;

/// Upper bound on the estimated token size of each artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBudgets {
    pub research: usize,
    pub analysis: usize,
    pub plan: usize,
    pub implement: usize,
}

impl Default for ArtifactBudgets {
    fn default() -> Self {
        Self {
            research: DEFAULT_RESEARCH_TOKENS,
            analysis: DEFAULT_ANALYSIS_TOKENS,
            plan: DEFAULT_PLAN_TOKENS,
            implement: DEFAULT_IMPLEMENT_TOKENS,
        }
    }
}

impl ArtifactBudgets {
    pub fn for_phase(&self, phase: PhaseId) -> Option<usize> {
        match phase {
            PhaseId::Research => Some(self.research),
            PhaseId::Analysis => Some(self.analysis),
            PhaseId::Plan => Some(self.plan),
            PhaseId::Implement => Some(self.implement),
            _ => None,
        }
    }
}

/// Text caps tried before any list entry is dropped.
const GENTLE_TEXT_CAPS: [usize; 3] = [256, 128, 64];
/// Text caps tried once the secondary lists are gone.
const HARD_TEXT_CAPS: [usize; 2] = [32, 16];

/// Shrink the artifact until it fits `budget`. Returns how many list items
/// were dropped.
///
/// Stages, each only while still over budget: shorten text down to 64
/// chars, drop secondary list entries (longest list first), shorten text
/// down to 16 chars, then drop entries from the core lists. Only a budget
/// smaller than an empty artifact can still be exceeded afterwards.
pub fn fit_to_budget(artifact: &mut PhaseArtifact, budget: usize) -> usize {
    let over = |a: &PhaseArtifact| a.estimated_tokens() > budget;
    let mut dropped = 0;

    for cap in GENTLE_TEXT_CAPS {
        if !over(artifact) {
            return dropped;
        }
        artifact.shorten_text(cap);
    }
    while over(artifact) && artifact.drop_one() {
        dropped += 1;
    }
    for cap in HARD_TEXT_CAPS {
        if !over(artifact) {
            return dropped;
        }
        artifact.shorten_text(cap);
    }
    while over(artifact) && artifact.drop_core() {
        dropped += 1;
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ImplementArtifact, ResearchArtifact, SectionSummary};

    #[test]
    fn test_budgets_grow_along_the_pipeline() {
        let b = ArtifactBudgets::default();
        assert!(b.research < b.analysis && b.analysis < b.plan && b.plan < b.implement);
        assert_eq!(b.for_phase(PhaseId::Critique), None);
    }

    #[test]
    fn test_fit_drops_until_within_budget() {
        let mut artifact = PhaseArtifact::Research(ResearchArtifact {
            requirements_summary: (0..20)
                .map(|i| format!("필수 요구사항 {i}: 클라우드 전환 및 운영 안정성 확보"))
                .collect(),
            ..Default::default()
        });
        let budget = artifact.estimated_tokens() / 2;
        let dropped = fit_to_budget(&mut artifact, budget);
        assert!(dropped > 0);
        assert!(artifact.estimated_tokens() <= budget);
    }

    #[test]
    fn test_fit_shortens_before_dropping_sections() {
        let mut artifact = PhaseArtifact::Implement(ImplementArtifact {
            section_summaries: (0..60)
                .map(|i| SectionSummary {
                    name: format!("섹션 {i}"),
                    summary: "가".repeat(300),
                    pages: 2.0,
                })
                .collect(),
            section_full_refs: (0..60).map(|i| format!("domain_state/implement#섹션 {i}")).collect(),
            ..Default::default()
        });
        let dropped = fit_to_budget(&mut artifact, DEFAULT_IMPLEMENT_TOKENS);
        assert_eq!(dropped, 0);
        assert!(artifact.estimated_tokens() <= DEFAULT_IMPLEMENT_TOKENS);
        let PhaseArtifact::Implement(a) = &artifact else {
            panic!("Expected implement artifact");
        };
        assert_eq!(a.section_summaries.len(), 60);
        assert_eq!(a.section_full_refs.len(), 60);
        assert!(a.section_summaries[0].summary.chars().count() < 300);
    }

    #[test]
    fn test_fit_drops_core_entries_as_last_resort() {
        let mut artifact = PhaseArtifact::Implement(ImplementArtifact {
            section_summaries: (0..400)
                .map(|i| SectionSummary {
                    name: format!("섹션 {i}"),
                    summary: "가".repeat(300),
                    pages: 1.0,
                })
                .collect(),
            ..Default::default()
        });
        let dropped = fit_to_budget(&mut artifact, 2_000);
        assert!(dropped > 0);
        assert!(artifact.estimated_tokens() <= 2_000);
    }

    #[test]
    fn test_fit_is_noop_when_within_budget() {
        let mut artifact = PhaseArtifact::Research(ResearchArtifact::default());
        assert_eq!(fit_to_budget(&mut artifact, 8_000), 0);
    }
}
