//! Phase Executor.
//!
//! Runs one attempt of one phase: a single agent call under a timeout, plus
//! the lookups the phase needs. A failed call never aborts the workflow; the
//! executor substitutes a degraded working state and reports the failure so
//! the engine can record it and decide whether to retry.
//!
//! The executor returns a [`PhaseUpdate`] and never touches `WorkflowState`
//! itself. The engine applies the update in one step, so a timed-out attempt
//! leaves no partial data behind.

use crate::agent::outputs::{
    AgentOutput, CritiqueOutput, FinalizeOutput, PlanOutput, ResearchOutput, RevisionOutput,
};
use crate::agent::{AgentPort, AgentRequest, TokenUsage};
use crate::artifacts::{ArtifactId, PhaseArtifact};
use crate::compaction::DomainUpdate;
use crate::errors::{AgentError, EngineError};
use crate::lookup::{Lookups, Person, ProposalSummary, ReferenceSummary};
use crate::phase::PhaseId;
use crate::quality::{DEFAULT_FALLBACK_SCORE_STEP, QualityLoopState};
use crate::state::{
    AnalysisWorking, DomainContext, ImplementWorking, PlanWorking, QualityWorking,
    ResearchWorking, WorkingState,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 300;

/// Similar past proposals kept from the research lookup.
const SIMILAR_PROPOSALS_TOP_K: usize = 3;
const TEAM_SIZE: usize = 5;
const SKILL_THEMES: usize = 3;
const REFERENCE_THEMES: usize = 2;
const REFERENCES_PER_THEME: usize = 2;
const MAX_PLAN_REFERENCES: usize = 5;

/// Inputs for one phase attempt.
#[derive(Debug, Clone)]
pub struct PhaseInput<'a> {
    pub phase: PhaseId,
    /// The artifact of the preceding phase (`None` for research).
    pub prior: Option<&'a PhaseArtifact>,
    pub context: DomainContext,
    /// Opaque reference to the RFP source, recorded by research.
    pub rfp_ref: &'a str,
    /// Current loop data for the quality phases.
    pub quality: Option<&'a QualityWorking>,
}

/// Outcome of one attempt, applied atomically by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseUpdate {
    pub working: WorkingState,
    /// Set when the agent failed and `working` holds the degraded fallback.
    pub error: Option<AgentError>,
    pub log: String,
    pub usage: Option<TokenUsage>,
    /// Full output of a quality phase, retained in `domain_state`.
    pub domain_update: Option<DomainUpdate>,
}

impl PhaseUpdate {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

pub struct PhaseExecutor {
    agent: Arc<dyn AgentPort>,
    lookups: Lookups,
    timeout: Duration,
    fallback_score_step: f32,
}

impl PhaseExecutor {
    pub fn new(agent: Arc<dyn AgentPort>, lookups: Lookups) -> Self {
        Self {
            agent,
            lookups,
            timeout: Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS),
            fallback_score_step: DEFAULT_FALLBACK_SCORE_STEP,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback_score_step(mut self, step: f32) -> Self {
        self.fallback_score_step = step;
        self
    }

    /// Run one attempt of `input.phase`.
    ///
    /// Errors only when the prior artifact is not the one the phase reads,
    /// which means the graph was driven out of order.
    pub async fn execute(&self, input: PhaseInput<'_>) -> Result<PhaseUpdate, EngineError> {
        let phase = input.phase;
        check_prior(phase, input.prior)?;

        let quality = input.quality.cloned().unwrap_or_default();
        let request = AgentRequest {
            phase,
            input_artifact: input.prior.cloned(),
            context: input.context.clone(),
            quality: phase.is_quality_phase().then(|| quality.loop_state.clone()),
        };

        let (output, usage, error) = match self.invoke(request).await {
            Ok((output, usage)) => (Some(output), usage, None),
            Err(e) => {
                warn!(%phase, error = %e, "agent attempt failed, using degraded fallback");
                (None, None, Some(e))
            }
        };

        let predecessor = input.prior.map(|a| a.id().clone()).unwrap_or_default();
        let feedback = input.context.feedback.clone();

        let (working, log, domain_update) = match phase {
            PhaseId::Research => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Research(r) => Some(r),
                    _ => None,
                });
                self.research(output, input.rfp_ref, feedback).await
            }
            PhaseId::Analysis => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Analysis(a) => Some(a),
                    _ => None,
                });
                let log = match &output {
                    Some(a) => format!(
                        "analysis complete: qualification {}, {} weaknesses",
                        a.qualification_status.label(),
                        a.our_weaknesses.len()
                    ),
                    None => "analysis unavailable, continuing with defaults".to_string(),
                };
                let working = WorkingState::Analysis(AnalysisWorking {
                    output,
                    predecessor,
                    feedback,
                });
                (working, log, None)
            }
            PhaseId::Plan => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Plan(p) => Some(p),
                    _ => None,
                });
                self.plan(output, predecessor, feedback).await
            }
            PhaseId::Implement => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Implement(i) => Some(i),
                    _ => None,
                });
                let target_pages = match input.prior {
                    Some(PhaseArtifact::Plan(plan)) => plan.planned_pages(),
                    _ => 0,
                };
                let log = match &output {
                    Some(i) => format!(
                        "drafted {} sections, {:.1}/{} pages",
                        i.sections.len(),
                        i.total_pages,
                        target_pages
                    ),
                    None => "drafting unavailable, continuing with an empty draft".to_string(),
                };
                let working = WorkingState::Implement(ImplementWorking {
                    output,
                    target_pages,
                    predecessor,
                    feedback,
                });
                (working, log, None)
            }
            PhaseId::Critique => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Critique(c) => Some(c),
                    _ => None,
                });
                critique(quality, output, feedback)
            }
            PhaseId::Revise => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Revision(r) => Some(r),
                    _ => None,
                });
                revise(quality, output, self.fallback_score_step)
            }
            PhaseId::Finalize => {
                let output = output.and_then(|o| match o {
                    AgentOutput::Finalize(f) => Some(f),
                    _ => None,
                });
                finalize(quality, output)
            }
            PhaseId::Completed | PhaseId::Error => {
                return Err(EngineError::InvariantViolation(format!(
                    "terminal phase {} cannot be executed",
                    phase
                )));
            }
        };

        let log = match &error {
            Some(e) => format!("{} (degraded: {})", log, e.kind()),
            None => log,
        };
        info!(%phase, degraded = error.is_some(), "{}", log);

        Ok(PhaseUpdate {
            working,
            error,
            log,
            usage,
            domain_update,
        })
    }

    /// Exactly one agent call, bounded by the timeout.
    async fn invoke(
        &self,
        request: AgentRequest,
    ) -> Result<(AgentOutput, Option<TokenUsage>), AgentError> {
        let phase = request.phase;
        let response = tokio::time::timeout(self.timeout, self.agent.invoke(request))
            .await
            .map_err(|_| AgentError::Timeout {
                phase,
                elapsed_secs: self.timeout.as_secs(),
            })??;

        if response.output.phase() != phase {
            return Err(AgentError::MalformedOutput {
                phase,
                reason: format!("agent answered for {}", response.output.phase()),
            });
        }
        response
            .output
            .validate()
            .map_err(|reason| AgentError::MalformedOutput { phase, reason })?;
        Ok((response.output, response.usage))
    }

    async fn research(
        &self,
        output: Option<ResearchOutput>,
        rfp_ref: &str,
        feedback: Option<String>,
    ) -> (WorkingState, String, Option<DomainUpdate>) {
        let title = output
            .as_ref()
            .map(|r| r.rfp_title.trim().to_string())
            .unwrap_or_default();

        let similar: Vec<ProposalSummary> = if title.is_empty() {
            Vec::new()
        } else {
            let mut found = self.lookups.similar_or_empty(&title).await;
            found.truncate(SIMILAR_PROPOSALS_TOP_K);
            found
        };

        let log = if title.is_empty() {
            "RFP could not be parsed".to_string()
        } else {
            format!(
                "parsed RFP '{}', {} similar past proposals",
                title,
                similar.len()
            )
        };
        let working = WorkingState::Research(ResearchWorking {
            output,
            similar_proposals: similar,
            rfp_ref: rfp_ref.to_string(),
            feedback,
        });
        (working, log, None)
    }

    async fn plan(
        &self,
        output: Option<PlanOutput>,
        predecessor: ArtifactId,
        feedback: Option<String>,
    ) -> (WorkingState, String, Option<DomainUpdate>) {
        let themes: Vec<String> = output
            .as_ref()
            .map(|p| p.win_themes.clone())
            .unwrap_or_default();
        let (personnel, references) = self.plan_lookups(&themes).await;

        let log = match &output {
            Some(p) => format!(
                "strategy drafted: {} win themes, {} people allocated, {} references",
                p.win_themes.len(),
                personnel.len(),
                references.len()
            ),
            None => "strategy unavailable, continuing with defaults".to_string(),
        };
        let working = WorkingState::Plan(PlanWorking {
            output,
            allocated_personnel: personnel,
            references,
            predecessor,
            feedback,
        });
        (working, log, None)
    }

    /// Team allocation and reference search, run concurrently.
    async fn plan_lookups(&self, themes: &[String]) -> (Vec<Person>, Vec<ReferenceSummary>) {
        if themes.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let skills: Vec<String> = themes
            .iter()
            .take(SKILL_THEMES)
            .filter_map(|t| t.split_whitespace().next())
            .map(str::to_string)
            .collect();

        let reference_searches: Vec<_> = themes
            .iter()
            .take(REFERENCE_THEMES)
            .map(|theme| self.lookups.references_or_empty(theme, REFERENCES_PER_THEME))
            .collect();

        let (personnel, reference_batches) = tokio::join!(
            self.lookups.team_or_empty(&skills, TEAM_SIZE),
            join_all(reference_searches)
        );

        let mut references: Vec<ReferenceSummary> = Vec::new();
        for r in reference_batches.into_iter().flatten() {
            if !references.iter().any(|known| known.title == r.title) {
                references.push(r);
            }
        }
        references.truncate(MAX_PLAN_REFERENCES);
        (personnel, references)
    }
}

fn check_prior(phase: PhaseId, prior: Option<&PhaseArtifact>) -> Result<(), EngineError> {
    let supplied = prior.map(|a| a.slot());
    if supplied != phase.input_slot() {
        return Err(EngineError::InvariantViolation(format!(
            "{} expects artifact {:?} as input, got {:?}",
            phase,
            phase.input_slot(),
            supplied
        )));
    }
    Ok(())
}

fn critique(
    mut quality: QualityWorking,
    output: Option<CritiqueOutput>,
    feedback: Option<String>,
) -> (WorkingState, String, Option<DomainUpdate>) {
    let log = match &output {
        Some(c) => {
            quality.loop_state.score = c.quality_score.clamp(0.0, 1.0);
            quality.loop_state.structural_issues = c.major_issues.clone();
            format!(
                "critique scored {:.2} with {} structural issues",
                c.quality_score,
                c.major_issues.len()
            )
        }
        None => format!(
            "critique unavailable, keeping score {:.2}",
            quality.loop_state.score
        ),
    };
    if feedback.is_some() {
        quality.feedback = feedback;
    }
    quality.critique = output.clone();
    quality.route = None;
    (
        WorkingState::Quality(quality),
        log,
        output.map(DomainUpdate::Critique),
    )
}

fn revise(
    mut quality: QualityWorking,
    output: Option<RevisionOutput>,
    fallback_step: f32,
) -> (WorkingState, String, Option<DomainUpdate>) {
    let state: &mut QualityLoopState = &mut quality.loop_state;
    let before = state.score;
    match output.as_ref().and_then(|r| r.quality_score) {
        Some(score) => state.record_revision(score),
        None => state.nudge(fallback_step),
    }
    let log = format!(
        "revision round {}: score {:.2} -> {:.2}",
        state.revision_rounds, before, state.score
    );
    (
        WorkingState::Quality(quality),
        log,
        output.map(DomainUpdate::Revision),
    )
}

fn finalize(
    mut quality: QualityWorking,
    output: Option<FinalizeOutput>,
) -> (WorkingState, String, Option<DomainUpdate>) {
    let finalized = output.clone().unwrap_or_default();
    let log = if finalized.document_ref.is_empty() {
        "final document assembled without a stored reference".to_string()
    } else {
        format!("final document assembled: {}", finalized.document_ref)
    };
    quality.finalized = Some(finalized);
    (
        WorkingState::Quality(quality),
        log,
        output.map(DomainUpdate::Finalize),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentResponse;
    use crate::agent::outputs::{AnalysisOutput, ImplementOutput};
    use crate::artifacts::{PlanArtifact, ResearchArtifact};
    use crate::lookup::catalog::{Catalog, CatalogPerson, CatalogProposal, CatalogReference};
    use crate::lookup::InMemoryCatalog;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Agent answering with a fixed output and counting calls.
    struct FixedAgent {
        output: Option<AgentOutput>,
        calls: Mutex<u32>,
    }

    impl FixedAgent {
        fn new(output: Option<AgentOutput>) -> Arc<Self> {
            Arc::new(Self {
                output,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl AgentPort for FixedAgent {
        async fn invoke(
            &self,
            request: AgentRequest,
        ) -> Result<crate::agent::AgentResponse, AgentError> {
            *self.calls.lock().unwrap() += 1;
            match &self.output {
                Some(o) => Ok(AgentResponse::new(o.clone()).with_usage(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                })),
                None => Err(AgentError::UpstreamFailure {
                    phase: request.phase,
                    message: "down".into(),
                }),
            }
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl AgentPort for SlowAgent {
        async fn invoke(&self, _request: AgentRequest) -> Result<AgentResponse, AgentError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AgentResponse::new(AgentOutput::Analysis(AnalysisOutput::default())))
        }
    }

    fn catalog_lookups() -> Lookups {
        let catalog = Catalog {
            proposals: vec![CatalogProposal {
                summary: ProposalSummary {
                    title: "클라우드 전환 1차".into(),
                    ..Default::default()
                },
                key_messages: vec![],
            }],
            references: vec![CatalogReference {
                title: "AWS 전환 사례".into(),
                content: String::new(),
                topics: vec!["AWS".into()],
            }],
            personnel: vec![CatalogPerson {
                person: Person {
                    name: "Kim".into(),
                    role: "PM".into(),
                    expertise: vec!["AWS".into()],
                },
                available: true,
            }],
        };
        Lookups::from_catalog(Arc::new(InMemoryCatalog::new(catalog)))
    }

    fn research_artifact() -> PhaseArtifact {
        let mut a = PhaseArtifact::Research(ResearchArtifact::default());
        a.seal();
        a
    }

    fn input(phase: PhaseId, prior: Option<&PhaseArtifact>) -> PhaseInput<'_> {
        PhaseInput {
            phase,
            prior,
            context: DomainContext::default(),
            rfp_ref: "rfp.txt",
            quality: None,
        }
    }

    #[tokio::test]
    async fn test_agent_called_once_per_attempt() {
        let agent = FixedAgent::new(Some(AgentOutput::Analysis(AnalysisOutput::default())));
        let executor = PhaseExecutor::new(agent.clone(), Lookups::empty());
        let prior = research_artifact();
        let update = executor
            .execute(input(PhaseId::Analysis, Some(&prior)))
            .await
            .unwrap();
        assert_eq!(agent.calls(), 1);
        assert!(!update.is_degraded());
        assert_eq!(update.usage.unwrap().total(), 15);
    }

    #[tokio::test]
    async fn test_failure_degrades_without_error() {
        let agent = FixedAgent::new(None);
        let executor = PhaseExecutor::new(agent.clone(), Lookups::empty());
        let prior = research_artifact();
        let update = executor
            .execute(input(PhaseId::Analysis, Some(&prior)))
            .await
            .unwrap();
        assert_eq!(agent.calls(), 1);
        assert!(matches!(
            update.error,
            Some(AgentError::UpstreamFailure { .. })
        ));
        match update.working {
            WorkingState::Analysis(w) => {
                assert!(w.output.is_none());
                assert_eq!(&w.predecessor, prior.id());
            }
            other => panic!("Expected analysis working state, got {other:?}"),
        }
        assert!(update.log.contains("degraded: upstream_failure"));
    }

    #[tokio::test]
    async fn test_timeout_is_agent_failure() {
        let executor = PhaseExecutor::new(Arc::new(SlowAgent), Lookups::empty())
            .with_timeout(Duration::from_millis(20));
        let prior = research_artifact();
        let update = executor
            .execute(input(PhaseId::Analysis, Some(&prior)))
            .await
            .unwrap();
        assert!(matches!(update.error, Some(AgentError::Timeout { .. })));
        assert!(matches!(update.working, WorkingState::Analysis(ref w) if w.output.is_none()));
    }

    #[tokio::test]
    async fn test_wrong_prior_is_invariant_violation() {
        let agent = FixedAgent::new(None);
        let executor = PhaseExecutor::new(agent.clone(), Lookups::empty());
        let prior = research_artifact();
        let err = executor
            .execute(input(PhaseId::Plan, Some(&prior)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_eq!(agent.calls(), 0);
    }

    #[tokio::test]
    async fn test_output_for_wrong_phase_is_malformed() {
        let agent = FixedAgent::new(Some(AgentOutput::Plan(PlanOutput {
            core_message: "x".into(),
            ..Default::default()
        })));
        let executor = PhaseExecutor::new(agent, Lookups::empty());
        let prior = research_artifact();
        let update = executor
            .execute(input(PhaseId::Analysis, Some(&prior)))
            .await
            .unwrap();
        assert!(matches!(
            update.error,
            Some(AgentError::MalformedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_research_looks_up_similar_proposals() {
        let agent = FixedAgent::new(Some(AgentOutput::Research(ResearchOutput {
            rfp_title: "클라우드 전환 사업".into(),
            ..Default::default()
        })));
        let executor = PhaseExecutor::new(agent, catalog_lookups());
        let update = executor.execute(input(PhaseId::Research, None)).await.unwrap();
        match update.working {
            WorkingState::Research(w) => {
                assert_eq!(w.similar_proposals.len(), 1);
                assert_eq!(w.rfp_ref, "rfp.txt");
            }
            other => panic!("Expected research working state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plan_allocates_team_and_references() {
        let agent = FixedAgent::new(Some(AgentOutput::Plan(PlanOutput {
            core_message: "안정적 전환".into(),
            win_themes: vec!["AWS 마이그레이션 전문성".into()],
            ..Default::default()
        })));
        let executor = PhaseExecutor::new(agent, catalog_lookups());
        let mut prior = PhaseArtifact::Analysis(Default::default());
        prior.seal();
        let update = executor
            .execute(input(PhaseId::Plan, Some(&prior)))
            .await
            .unwrap();
        match update.working {
            WorkingState::Plan(w) => {
                assert_eq!(w.allocated_personnel.len(), 1);
                assert_eq!(w.references.len(), 1);
            }
            other => panic!("Expected plan working state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_implement_targets_planned_pages() {
        let agent = FixedAgent::new(Some(AgentOutput::Implement(ImplementOutput::default())));
        let executor = PhaseExecutor::new(agent, Lookups::empty());
        let mut prior = PhaseArtifact::Plan(PlanArtifact {
            section_plans: vec![
                crate::agent::outputs::SectionPlan {
                    name: "a".into(),
                    key_message: String::new(),
                    pages: 20,
                },
                crate::agent::outputs::SectionPlan {
                    name: "b".into(),
                    key_message: String::new(),
                    pages: 30,
                },
            ],
            ..Default::default()
        });
        prior.seal();
        let update = executor
            .execute(input(PhaseId::Implement, Some(&prior)))
            .await
            .unwrap();
        assert!(matches!(update.working, WorkingState::Implement(ref w) if w.target_pages == 50));
    }

    #[test]
    fn test_revise_fallback_nudges_score() {
        let quality = QualityWorking {
            loop_state: QualityLoopState::new(0.70, 1, vec![]),
            ..Default::default()
        };
        let (working, log, _) = revise(quality, None, 0.05);
        let q = working.quality().unwrap();
        assert!((q.loop_state.score - 0.75).abs() < 1e-6);
        assert_eq!(q.loop_state.revision_rounds, 2);
        assert!(log.contains("revision round 2"));
    }

    #[test]
    fn test_revise_uses_agent_score() {
        let quality = QualityWorking {
            loop_state: QualityLoopState::new(0.5, 0, vec![]),
            ..Default::default()
        };
        let output = RevisionOutput {
            quality_score: Some(0.9),
            ..Default::default()
        };
        let (working, _, domain) = revise(quality, Some(output), 0.05);
        assert_eq!(working.quality().unwrap().loop_state.score, 0.9);
        assert!(matches!(domain, Some(DomainUpdate::Revision(_))));
    }

    #[test]
    fn test_degraded_critique_keeps_loop_state() {
        let quality = QualityWorking {
            loop_state: QualityLoopState::new(0.6, 2, vec![]),
            ..Default::default()
        };
        let (working, _, domain) = critique(quality, None, None);
        let q = working.quality().unwrap();
        assert_eq!(q.loop_state.score, 0.6);
        assert_eq!(q.loop_state.revision_rounds, 2);
        assert!(domain.is_none());
    }

    #[test]
    fn test_critique_records_structural_issues() {
        let output = CritiqueOutput {
            quality_score: 0.9,
            major_issues: vec!["목차 불일치".into()],
            ..Default::default()
        };
        let (working, _, _) = critique(QualityWorking::default(), Some(output), None);
        let q = working.quality().unwrap();
        assert_eq!(q.loop_state.structural_issues, vec!["목차 불일치"]);
        assert_eq!(q.loop_state.score, 0.9);
    }
}
