//! Human-readable summaries shown at the mandatory gates.

use crate::artifacts::PlanArtifact;
use crate::state::QualityWorking;

const MAX_LISTED_PEOPLE: usize = 5;
const MAX_LISTED_SECTIONS: usize = 5;
const MAX_LISTED_ISSUES: usize = 3;

/// Strategy overview for gate 3.
pub fn strategy_summary(plan: &PlanArtifact) -> String {
    let mut lines = vec![
        format!("핵심 메시지: {}", plan.core_message),
        String::new(),
        "수주 테마:".to_string(),
    ];
    for (i, theme) in plan.win_themes.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, theme));
    }

    lines.push(String::new());
    lines.push("차별화:".to_string());
    for d in &plan.differentiators {
        lines.push(format!("  • {}", d));
    }

    lines.push(String::new());
    lines.push("핵심 인력:".to_string());
    for p in plan.personnel_assignments.iter().take(MAX_LISTED_PEOPLE) {
        match &p.grade {
            Some(grade) => lines.push(format!("  • {}: {} ({})", p.role, p.name, grade)),
            None => lines.push(format!("  • {}: {}", p.role, p.name)),
        }
    }

    lines.push(String::new());
    lines.push("섹션 배분:".to_string());
    for s in plan.section_plans.iter().take(MAX_LISTED_SECTIONS) {
        lines.push(format!("  • {}: {}p", s.name, s.pages));
    }

    lines.join("\n")
}

/// Quality report for gate 5.
pub fn final_summary(quality: &QualityWorking, document_ref: Option<&str>) -> String {
    let state = &quality.loop_state;
    let mut lines = vec![
        format!("최종 품질 점수: {:.2}/1.0", state.score),
        format!("수정 라운드: {}회", state.revision_rounds),
        format!("생성 문서: {}", document_ref.unwrap_or("")),
    ];

    if let Some(route) = quality.route {
        lines.push(format!("품질 루프 결과: {}", route));
    }

    let remaining: Vec<&String> = state
        .structural_issues
        .iter()
        .chain(
            quality
                .critique
                .iter()
                .flat_map(|c| c.minor_issues.iter()),
        )
        .take(MAX_LISTED_ISSUES)
        .collect();
    if !remaining.is_empty() {
        lines.push(String::new());
        lines.push("남은 이슈:".to_string());
        for issue in remaining {
            lines.push(format!("  • {}", issue));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::outputs::{CritiqueOutput, PersonnelAssignment, SectionPlan};
    use crate::quality::{QualityLoopState, QualityRoute};

    #[test]
    fn test_strategy_summary_lists_themes_and_sections() {
        let plan = PlanArtifact {
            core_message: "클라우드 전환의 확실한 파트너".into(),
            win_themes: vec!["AWS 전문성".into(), "무중단 전환".into()],
            personnel_assignments: vec![PersonnelAssignment {
                role: "PM".into(),
                name: "Kim".into(),
                grade: Some("특급".into()),
            }],
            section_plans: vec![SectionPlan {
                name: "사업 이해".into(),
                key_message: String::new(),
                pages: 10,
            }],
            ..Default::default()
        };
        let summary = strategy_summary(&plan);
        assert!(summary.contains("핵심 메시지: 클라우드 전환의 확실한 파트너"));
        assert!(summary.contains("  2. 무중단 전환"));
        assert!(summary.contains("PM: Kim (특급)"));
        assert!(summary.contains("사업 이해: 10p"));
    }

    #[test]
    fn test_final_summary_caps_issue_list() {
        let quality = QualityWorking {
            loop_state: QualityLoopState::new(0.6, 3, vec!["a".into(), "b".into()]),
            critique: Some(CritiqueOutput {
                quality_score: 0.6,
                minor_issues: vec!["c".into(), "d".into()],
                ..Default::default()
            }),
            route: Some(QualityRoute::Escalate),
            ..Default::default()
        };
        let summary = final_summary(&quality, None);
        assert!(summary.contains("0.60/1.0"));
        assert!(summary.contains("수정 라운드: 3회"));
        assert!(summary.contains("escalate"));
        assert!(summary.contains("  • c"));
        assert!(!summary.contains("  • d"));
    }
}
