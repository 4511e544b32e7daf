//! Artifact Compressor.
//!
//! Turns a phase's working data into its bounded artifact. Compression is a
//! pure function of the working state: it applies the per-field caps, fills
//! anything the agent failed to produce with defaults, shrinks the artifact
//! until it fits its token budget (see [`fit_to_budget`]) and finally seals
//! the content id.
//!
//! The full outputs travel alongside as a [`DomainUpdate`] so the engine can
//! keep them in `domain_state` while the working area is cleared.
//!
//! ## Budgets
//!
//! Configured in `bidforge.toml`:
//!
//! ```toml
//! [artifacts]
//! research_tokens = 8000
//! analysis_tokens = 10000
//! plan_tokens = 12000
//! implement_tokens = 15000
//! ```

pub mod budget;

pub use budget::{ArtifactBudgets, fit_to_budget};

use crate::agent::outputs::{
    AnalysisOutput, CritiqueOutput, FinalizeOutput, ImplementOutput, PersonnelAssignment,
    PlanOutput, ResearchOutput, RevisionOutput,
};
use crate::artifacts::schema::{
    MAX_CAPABILITIES, MAX_CORE_MESSAGE_CHARS, MAX_HEADER_CHARS, MAX_IMPLICIT_INTENT_CHARS,
    MAX_ITEM_CHARS, MAX_LANDSCAPE_CHARS, MAX_PAST_PROPOSALS, MAX_REFERENCES, MAX_REQUIREMENTS, MAX_RISK_FACTORS,
    MAX_SECTION_SUMMARY_CHARS, MAX_STRENGTHS, MAX_WEAKNESSES, MAX_WIN_THEMES,
};
use crate::artifacts::tokens::truncate_chars;
use crate::artifacts::{
    AnalysisArtifact, ImplementArtifact, PhaseArtifact, PlanArtifact, ResearchArtifact,
    SectionSummary,
};
use crate::lookup::{Person, ProposalSummary, ReferenceSummary};
use crate::phase::PhaseId;
use crate::state::{
    AnalysisWorking, DomainState, ImplementWorking, PlanWorking, ResearchWorking, WorkingState,
};
use tracing::debug;

/// Cap for free-text fields the schema leaves unbounded.
const MAX_FREE_TEXT_CHARS: usize = 500;

/// Full outputs to retain once the working area is gone.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainUpdate {
    Research {
        output: ResearchOutput,
        similar_proposals: Vec<ProposalSummary>,
    },
    Analysis(AnalysisOutput),
    Plan {
        output: PlanOutput,
        personnel: Vec<Person>,
        references: Vec<ReferenceSummary>,
    },
    Implement(ImplementOutput),
    Critique(CritiqueOutput),
    Revision(RevisionOutput),
    Finalize(FinalizeOutput),
}

impl DomainUpdate {
    pub fn apply(self, domain: &mut DomainState) {
        match self {
            Self::Research {
                output,
                similar_proposals,
            } => {
                domain.research = Some(output);
                domain.similar_proposals = similar_proposals;
            }
            Self::Analysis(output) => domain.analysis = Some(output),
            Self::Plan {
                output,
                personnel,
                references,
            } => {
                domain.plan = Some(output);
                domain.allocated_personnel = personnel;
                domain.references = references;
            }
            Self::Implement(output) => domain.implement = Some(output),
            Self::Critique(output) => domain.critiques.push(output),
            Self::Revision(output) => domain.revisions.push(output),
            Self::Finalize(output) => domain.finalized = Some(output),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compressed {
    pub artifact: PhaseArtifact,
    pub domain_update: DomainUpdate,
    /// List items dropped to meet the token budget. Text shortening is not counted.
    pub dropped_items: usize,
}

/// Compress the working data of `phase` into its artifact.
///
/// Missing or oversized outputs never fail compression. An error means the
/// working area does not belong to `phase`, or the configured budget is
/// smaller than an empty artifact; the caller treats both as fatal.
pub fn compress(
    phase: PhaseId,
    working: WorkingState,
    budgets: &ArtifactBudgets,
) -> Result<Compressed, String> {
    let budget = budgets
        .for_phase(phase)
        .ok_or_else(|| format!("phase {} does not produce an artifact", phase))?;

    let (mut artifact, domain_update) = match (phase, working) {
        (PhaseId::Research, WorkingState::Research(w)) => compress_research(w),
        (PhaseId::Research, WorkingState::Empty) => compress_research(ResearchWorking::default()),
        (PhaseId::Analysis, WorkingState::Analysis(w)) => compress_analysis(w),
        (PhaseId::Plan, WorkingState::Plan(w)) => compress_plan(w),
        (PhaseId::Implement, WorkingState::Implement(w)) => compress_implement(w),
        (phase, other) => {
            return Err(format!(
                "working state owned by {:?} cannot be compressed for {}",
                other.owner(),
                phase
            ));
        }
    };

    let dropped_items = fit_to_budget(&mut artifact, budget);
    artifact.seal();

    let violations = artifact.violations(budget);
    if !violations.is_empty() {
        return Err(format!(
            "artifact {} failed validation: {}",
            artifact.slot(),
            violations.join("; ")
        ));
    }
    debug!(
        %phase,
        id = %artifact.id(),
        tokens = artifact.estimated_tokens(),
        dropped_items,
        "compressed working state"
    );

    Ok(Compressed {
        artifact,
        domain_update,
        dropped_items,
    })
}

fn capped<T: Clone>(items: &[T], max: usize) -> Vec<T> {
    items.iter().take(max).cloned().collect()
}

/// Like [`capped`], also cutting each entry to [`MAX_ITEM_CHARS`].
fn capped_text(items: &[String], max: usize) -> Vec<String> {
    items
        .iter()
        .take(max)
        .map(|item| truncate_chars(item, MAX_ITEM_CHARS))
        .collect()
}

fn header(text: &str) -> String {
    truncate_chars(text.trim(), MAX_HEADER_CHARS)
}

fn compress_research(w: ResearchWorking) -> (PhaseArtifact, DomainUpdate) {
    let output = w.output.unwrap_or_default();

    let requirements: Vec<String> = output
        .mandatory_requirements
        .iter()
        .chain(output.optional_requirements.iter())
        .take(MAX_REQUIREMENTS)
        .map(|r| truncate_chars(r, MAX_ITEM_CHARS))
        .collect();

    let mut past: Vec<ProposalSummary> = Vec::new();
    for p in output.past_proposals.iter().chain(w.similar_proposals.iter()) {
        if past.len() == MAX_PAST_PROPOSALS {
            break;
        }
        if !past.iter().any(|known| known.title == p.title) {
            past.push(p.clone());
        }
    }

    let artifact = ResearchArtifact {
        id: Default::default(),
        predecessor: None,
        rfp_title: header(&output.rfp_title),
        client_name: header(&output.client_name),
        submission_deadline: header(&output.submission_deadline),
        budget_range: output.budget_range.as_deref().map(header),
        page_limit: output.page_limit,
        evaluation_method: truncate_chars(&output.evaluation_method, MAX_FREE_TEXT_CHARS),
        requirements_summary: requirements,
        evaluation_criteria: capped_text(&output.evaluation_criteria, MAX_REQUIREMENTS),
        past_proposals_summary: past,
        competition_history: truncate_chars(&output.competition_history, MAX_FREE_TEXT_CHARS),
        relevant_capabilities: capped_text(&output.relevant_capabilities, MAX_CAPABILITIES),
        available_personnel_count: output.available_personnel_count,
        rfp_document_ref: w.rfp_ref,
        full_data_refs: vec![DomainState::reference(PhaseId::Research)],
    };

    (
        PhaseArtifact::Research(artifact),
        DomainUpdate::Research {
            output,
            similar_proposals: w.similar_proposals,
        },
    )
}

fn compress_analysis(w: AnalysisWorking) -> (PhaseArtifact, DomainUpdate) {
    let output = w.output.unwrap_or_default();
    let total_target_pages = if output.total_target_pages > 0 {
        output.total_target_pages
    } else {
        output.section_allocations.iter().map(|s| s.pages).sum()
    };

    let artifact = AnalysisArtifact {
        id: Default::default(),
        predecessor: Some(w.predecessor),
        evaluation_criteria: capped(&output.evaluation_criteria, MAX_REQUIREMENTS),
        mandatory_requirements: capped(&output.mandatory_requirements, MAX_REQUIREMENTS),
        implicit_intent: truncate_chars(&output.implicit_intent, MAX_IMPLICIT_INTENT_CHARS),
        risk_factors: capped(&output.risk_factors, MAX_RISK_FACTORS),
        client_priorities: capped(&output.client_priorities, MAX_REQUIREMENTS),
        competitive_landscape: truncate_chars(&output.competitive_landscape, MAX_LANDSCAPE_CHARS),
        our_strengths: capped(&output.our_strengths, MAX_STRENGTHS),
        our_weaknesses: capped(&output.our_weaknesses, MAX_WEAKNESSES),
        attack_strategy_hint: truncate_chars(&output.recommended_strategy, MAX_FREE_TEXT_CHARS),
        section_allocations: output.section_allocations.clone(),
        total_target_pages,
        qualification_status: output.qualification_status,
        qualification_gaps: output.qualification_gaps.clone(),
        analysis_ref: DomainState::reference(PhaseId::Analysis),
    };

    (
        PhaseArtifact::Analysis(artifact),
        DomainUpdate::Analysis(output),
    )
}

fn compress_plan(w: PlanWorking) -> (PhaseArtifact, DomainUpdate) {
    let output = w.output.unwrap_or_default();

    let personnel_assignments = if output.personnel_assignments.is_empty() {
        w.allocated_personnel
            .iter()
            .map(|p| PersonnelAssignment {
                role: p.role.clone(),
                name: p.name.clone(),
                grade: None,
            })
            .collect()
    } else {
        output.personnel_assignments.clone()
    };

    let artifact = PlanArtifact {
        id: Default::default(),
        predecessor: Some(w.predecessor),
        core_message: truncate_chars(&output.core_message, MAX_CORE_MESSAGE_CHARS),
        win_themes: capped_text(&output.win_themes, MAX_WIN_THEMES),
        differentiators: capped_text(&output.differentiators, usize::MAX),
        section_plans: output.section_plans.clone(),
        personnel_assignments,
        language_guidelines: capped_text(&output.language_guidelines, usize::MAX),
        generation_order: output.generation_order.clone(),
        references: capped(&w.references, MAX_REFERENCES),
        strategy_ref: DomainState::reference(PhaseId::Plan),
    };

    (
        PhaseArtifact::Plan(artifact),
        DomainUpdate::Plan {
            output,
            personnel: w.allocated_personnel,
            references: w.references,
        },
    )
}

fn compress_implement(w: ImplementWorking) -> (PhaseArtifact, DomainUpdate) {
    let output = w.output.unwrap_or_default();

    let section_summaries: Vec<SectionSummary> = output
        .sections
        .iter()
        .map(|s| {
            let source = if s.summary.trim().is_empty() {
                &s.content
            } else {
                &s.summary
            };
            SectionSummary {
                name: s.name.clone(),
                summary: truncate_chars(source, MAX_SECTION_SUMMARY_CHARS),
                pages: s.pages.max(0.0),
            }
        })
        .collect();

    let total_pages = if output.total_pages > 0.0 {
        output.total_pages
    } else {
        section_summaries.iter().map(|s| s.pages).sum()
    };
    let implement_ref = DomainState::reference(PhaseId::Implement);
    let section_full_refs = output
        .sections
        .iter()
        .map(|s| format!("{}#{}", implement_ref, s.name))
        .collect();

    let artifact = ImplementArtifact {
        id: Default::default(),
        predecessor: Some(w.predecessor),
        section_summaries,
        total_pages,
        total_target_pages: w.target_pages,
        overall_traceability: output.traceability.clamp(0.0, 1.0),
        section_full_refs,
        generation_notes: output.required_claims.clone(),
    };

    (
        PhaseArtifact::Implement(artifact),
        DomainUpdate::Implement(output),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::outputs::DraftSection;
    use crate::artifacts::ArtifactId;

    fn research_working() -> WorkingState {
        WorkingState::Research(ResearchWorking {
            output: Some(ResearchOutput {
                rfp_title: "  차세대 클라우드 전환 ".into(),
                mandatory_requirements: (0..15).map(|i| format!("필수 {i}")).collect(),
                optional_requirements: (0..15).map(|i| format!("선택 {i}")).collect(),
                past_proposals: vec![ProposalSummary {
                    title: "A".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            similar_proposals: vec![
                ProposalSummary {
                    title: "A".into(),
                    ..Default::default()
                },
                ProposalSummary {
                    title: "B".into(),
                    ..Default::default()
                },
            ],
            rfp_ref: "inputs/rfp.txt".into(),
            feedback: None,
        })
    }

    #[test]
    fn test_research_caps_and_merges() {
        let compressed =
            compress(PhaseId::Research, research_working(), &ArtifactBudgets::default()).unwrap();
        let PhaseArtifact::Research(a) = &compressed.artifact else {
            panic!("Expected research artifact");
        };
        assert_eq!(a.rfp_title, "차세대 클라우드 전환");
        assert_eq!(a.requirements_summary.len(), MAX_REQUIREMENTS);
        assert_eq!(a.past_proposals_summary.len(), 2);
        assert_eq!(a.predecessor, None);
        assert!(a.id.as_str().starts_with("artifact-1-"));
        assert_eq!(a.full_data_refs, vec!["domain_state/research"]);
    }

    #[test]
    fn test_empty_working_still_yields_valid_artifact() {
        let compressed =
            compress(PhaseId::Research, WorkingState::Empty, &ArtifactBudgets::default()).unwrap();
        assert!(
            compressed
                .artifact
                .violations(ArtifactBudgets::default().research)
                .is_empty()
        );
    }

    #[test]
    fn test_degraded_analysis_keeps_predecessor() {
        let working = WorkingState::Analysis(AnalysisWorking {
            output: None,
            predecessor: ArtifactId("artifact-1-abc".into()),
            feedback: None,
        });
        let compressed = compress(PhaseId::Analysis, working, &ArtifactBudgets::default()).unwrap();
        assert_eq!(
            compressed.artifact.predecessor(),
            Some(&ArtifactId("artifact-1-abc".into()))
        );
    }

    #[test]
    fn test_compression_is_deterministic() {
        let budgets = ArtifactBudgets::default();
        let a = compress(PhaseId::Research, research_working(), &budgets).unwrap();
        let b = compress(PhaseId::Research, research_working(), &budgets).unwrap();
        assert_eq!(a.artifact, b.artifact);
    }

    #[test]
    fn test_mismatched_working_state_is_an_error() {
        let err = compress(
            PhaseId::Plan,
            WorkingState::Analysis(AnalysisWorking::default()),
            &ArtifactBudgets::default(),
        )
        .unwrap_err();
        assert!(err.contains("plan"));
    }

    #[test]
    fn test_plan_falls_back_to_allocated_personnel() {
        let working = WorkingState::Plan(PlanWorking {
            output: Some(PlanOutput {
                core_message: "x".repeat(250),
                ..Default::default()
            }),
            allocated_personnel: vec![Person {
                name: "Lee".into(),
                role: "Architect".into(),
                expertise: vec![],
            }],
            references: vec![],
            predecessor: ArtifactId("artifact-2-abc".into()),
            feedback: None,
        });
        let compressed = compress(PhaseId::Plan, working, &ArtifactBudgets::default()).unwrap();
        let PhaseArtifact::Plan(plan) = &compressed.artifact else {
            panic!("Expected plan artifact");
        };
        assert_eq!(plan.core_message.chars().count(), MAX_CORE_MESSAGE_CHARS);
        assert_eq!(plan.personnel_assignments[0].name, "Lee");
    }

    #[test]
    fn test_implement_summaries_and_totals() {
        let working = WorkingState::Implement(ImplementWorking {
            output: Some(ImplementOutput {
                sections: vec![
                    DraftSection {
                        name: "사업 이해".into(),
                        content: "본문".repeat(400),
                        summary: String::new(),
                        pages: 12.0,
                    },
                    DraftSection {
                        name: "수행 방안".into(),
                        content: String::new(),
                        summary: "요약".into(),
                        pages: 30.5,
                    },
                ],
                traceability: 1.7,
                ..Default::default()
            }),
            target_pages: 40,
            predecessor: ArtifactId("artifact-3-abc".into()),
            feedback: None,
        });
        let compressed =
            compress(PhaseId::Implement, working, &ArtifactBudgets::default()).unwrap();
        let PhaseArtifact::Implement(a) = &compressed.artifact else {
            panic!("Expected implement artifact");
        };
        assert_eq!(a.section_summaries[0].summary.chars().count(), MAX_SECTION_SUMMARY_CHARS);
        assert_eq!(a.total_pages, 42.5);
        assert_eq!(a.total_target_pages, 40);
        assert_eq!(a.overall_traceability, 1.0);
        assert_eq!(a.section_full_refs[1], "domain_state/implement#수행 방안");
    }

    #[test]
    fn test_many_long_sections_still_fit_the_budget() {
        let budgets = ArtifactBudgets::default();
        let working = WorkingState::Implement(ImplementWorking {
            output: Some(ImplementOutput {
                sections: (0..50)
                    .map(|i| DraftSection {
                        name: format!("섹션 {i}"),
                        content: String::new(),
                        summary: "가".repeat(300),
                        pages: 2.0,
                    })
                    .collect(),
                traceability: 0.9,
                ..Default::default()
            }),
            target_pages: 100,
            predecessor: ArtifactId("artifact-3-abc".into()),
            feedback: None,
        });
        let compressed = compress(PhaseId::Implement, working, &budgets).unwrap();
        let PhaseArtifact::Implement(a) = &compressed.artifact else {
            panic!("Expected implement artifact");
        };
        assert_eq!(a.section_summaries.len(), 50);
        assert!(compressed.artifact.estimated_tokens() <= budgets.implement);
        assert!(compressed.artifact.violations(budgets.implement).is_empty());
    }

    #[test]
    fn test_oversized_headers_and_themes_are_cut() {
        let budgets = ArtifactBudgets::default();
        let working = WorkingState::Research(ResearchWorking {
            output: Some(ResearchOutput {
                rfp_title: "가".repeat(5_000),
                client_name: "나".repeat(5_000),
                submission_deadline: "다".repeat(5_000),
                budget_range: Some("라".repeat(5_000)),
                ..Default::default()
            }),
            ..Default::default()
        });
        let compressed = compress(PhaseId::Research, working, &budgets).unwrap();
        let PhaseArtifact::Research(a) = &compressed.artifact else {
            panic!("Expected research artifact");
        };
        assert_eq!(a.rfp_title.chars().count(), MAX_HEADER_CHARS);
        assert!(a.budget_range.as_ref().unwrap().chars().count() <= MAX_HEADER_CHARS);

        let plan = WorkingState::Plan(PlanWorking {
            output: Some(PlanOutput {
                win_themes: vec!["테마".repeat(2_000); 5],
                section_plans: (0..200)
                    .map(|i| crate::agent::outputs::SectionPlan {
                        name: format!("섹션 {i}"),
                        key_message: "메시지".repeat(100),
                        pages: 1,
                    })
                    .collect(),
                ..Default::default()
            }),
            predecessor: ArtifactId("artifact-2-abc".into()),
            ..Default::default()
        });
        let compressed = compress(PhaseId::Plan, plan, &budgets).unwrap();
        assert!(compressed.artifact.violations(budgets.plan).is_empty());
    }

    #[test]
    fn test_domain_update_keeps_full_output() {
        let compressed =
            compress(PhaseId::Research, research_working(), &ArtifactBudgets::default()).unwrap();
        let mut domain = DomainState::default();
        compressed.domain_update.apply(&mut domain);
        let research = domain.research.unwrap();
        assert_eq!(research.mandatory_requirements.len(), 15);
        assert_eq!(domain.similar_proposals.len(), 2);
    }
}
