//! Gate evaluation: a pure function of the staged artifact and run history.

use super::summary::{final_summary, strategy_summary};
use super::{GateAction, GateId, HitlDecision};
use crate::artifacts::{AnalysisArtifact, ImplementArtifact, PhaseArtifact, ResearchArtifact};
use crate::agent::outputs::QualificationStatus;
use crate::state::{WorkflowState, WorkingState};
use serde::{Deserialize, Serialize};

/// Thresholds for the conditional gates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Gate 2 recommends a human at this many identified weaknesses.
    pub weakness_threshold: usize,
    /// Gate 4 requires a human above this relative page deviation.
    pub page_deviation_limit: f32,
    /// Gate 4 requires a human below this requirement traceability.
    pub traceability_floor: f32,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            weakness_threshold: 3,
            page_deviation_limit: 0.3,
            traceability_floor: 0.8,
        }
    }
}

/// Evaluate `gate` against the workflow. Deterministic and side-effect free.
pub fn evaluate_gate(gate: GateId, state: &WorkflowState, policy: &GatePolicy) -> HitlDecision {
    if state.express_mode && !gate.is_mandatory() {
        return HitlDecision::auto_pass(
            gate,
            format!("긴급 모드: Gate #{} 자동 통과", gate.number()),
        );
    }

    match (gate, state.staged_artifact.as_ref()) {
        (GateId::Research, Some(PhaseArtifact::Research(a))) => research_gate(a),
        (GateId::Analysis, Some(PhaseArtifact::Analysis(a))) => analysis_gate(a, policy),
        (GateId::Strategy, staged) => {
            let summary = match staged {
                Some(PhaseArtifact::Plan(plan)) => strategy_summary(plan),
                _ => String::from("전략 산출물이 없습니다."),
            };
            HitlDecision::human(
                gate,
                GateAction::RequireHuman,
                "전략 승인은 항상 사람이 해야 합니다.",
                summary,
                &["핵심 전략 메시지", "차별화 포인트", "인력 배정", "섹션별 분량 배분"],
            )
        }
        (GateId::Draft, Some(PhaseArtifact::Implement(a))) => draft_gate(a, policy),
        (GateId::Final, _) => {
            let summary = match &state.working_state {
                WorkingState::Quality(quality) => {
                    let document = quality
                        .finalized
                        .as_ref()
                        .map(|f| f.document_ref.as_str());
                    final_summary(quality, document)
                }
                _ => String::from("품질 검토 결과가 없습니다."),
            };
            HitlDecision::human(
                gate,
                GateAction::RequireHuman,
                "최종 승인은 항상 사람이 해야 합니다.",
                summary,
                &["최종 품질 점수 확인", "문서 형식 확인", "제출 승인"],
            )
        }
        (gate, _) => HitlDecision::human(
            gate,
            GateAction::RequireHuman,
            format!("Gate #{} 검토 대상 산출물이 없습니다.", gate.number()),
            "이전 단계의 산출물을 찾지 못했습니다.",
            &["이전 단계 재실행 여부"],
        ),
    }
}

fn research_gate(artifact: &ResearchArtifact) -> HitlDecision {
    let gate = GateId::Research;
    if artifact.rfp_title.trim().is_empty() {
        return HitlDecision::human(
            gate,
            GateAction::RequireHuman,
            "RFP 파싱 실패. 문서를 확인해주세요.",
            "RFP 문서에서 텍스트를 추출하지 못했습니다.",
            &["RFP 문서 재업로드 또는 수동 입력"],
        );
    }
    let past_count = artifact.past_proposals_summary.len();
    if past_count == 0 {
        return HitlDecision::human(
            gate,
            GateAction::RecommendHuman,
            "참조할 과거 실적이 0건. 수동으로 참조 자료를 추가할 수 있습니다.",
            "유사 과거 실적을 찾지 못했습니다.",
            &["과거 실적 수동 추가 여부"],
        );
    }
    HitlDecision::auto_pass(
        gate,
        format!("수집 완료. RFP 파싱 성공, 과거 실적 {}건.", past_count),
    )
}

fn analysis_gate(artifact: &AnalysisArtifact, policy: &GatePolicy) -> HitlDecision {
    let gate = GateId::Analysis;
    if artifact.qualification_status == QualificationStatus::Unmet {
        return HitlDecision::human(
            gate,
            GateAction::RequireHuman,
            "필수 자격 요건 미충족. 입찰 포기 또는 대응 방안 결정 필요.",
            format!("자격 요건 미충족: {}", artifact.qualification_gaps.join(", ")),
            &["입찰 계속 여부", "자격 보완 방안"],
        );
    }
    let weaknesses = artifact.our_weaknesses.len();
    if weaknesses >= policy.weakness_threshold {
        return HitlDecision::human(
            gate,
            GateAction::RecommendHuman,
            format!("약점 {}개 식별. 전략 수립 전 확인 권장.", weaknesses),
            format!("식별된 약점: {}", artifact.our_weaknesses.join(", ")),
            &["약점 대응 방향 확인"],
        );
    }
    HitlDecision::auto_pass(gate, "분석 정상 완료. 자격 충족, 경쟁 환경 양호.")
}

fn draft_gate(artifact: &ImplementArtifact, policy: &GatePolicy) -> HitlDecision {
    let gate = GateId::Draft;
    let deviation = artifact.page_deviation();
    let traceability = artifact.overall_traceability;

    let mut issues = Vec::new();
    if deviation > policy.page_deviation_limit {
        issues.push(format!(
            "분량 편차 {:.0}% (목표 {}p, 실제 {:.1}p)",
            deviation * 100.0,
            artifact.total_target_pages,
            artifact.total_pages
        ));
    }
    if traceability < policy.traceability_floor {
        issues.push(format!(
            "요구사항 커버리지 {:.0}% (목표 {:.0}%)",
            traceability * 100.0,
            policy.traceability_floor * 100.0
        ));
    }

    if !issues.is_empty() {
        return HitlDecision::human(
            gate,
            GateAction::RequireHuman,
            format!("초안 품질 이슈: {}", issues.join(", ")),
            issues.join("\n"),
            &["방향 수정 여부", "특정 섹션 재작성 지시"],
        );
    }
    HitlDecision::auto_pass(
        gate,
        format!(
            "초안 정상. 분량 {:.1}/{}p, 커버리지 {:.0}%.",
            artifact.total_pages,
            artifact.total_target_pages,
            traceability * 100.0
        ),
    )
}
