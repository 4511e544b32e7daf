//! Terminal prompt for answering a suspended gate.

use super::{GateAction, HumanResponse, SuspendPayload};
use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

const WRAP_WIDTH: usize = 88;

/// Render a suspension for the terminal.
pub fn render_payload(payload: &SuspendPayload) -> String {
    let label = match payload.action {
        GateAction::RequireHuman => style("approval required").red().bold(),
        GateAction::RecommendHuman => style("review recommended").yellow().bold(),
        GateAction::AutoPass => style("auto pass").green(),
    };
    let mut out = format!(
        "{} {} ({})\n",
        style(payload.gate_id.to_string()).cyan().bold(),
        payload.gate_id.title(),
        label
    );
    for line in textwrap::wrap(&payload.reason, WRAP_WIDTH) {
        out.push_str(&format!("  {}\n", line));
    }
    if !payload.summary.is_empty() {
        out.push('\n');
        for line in payload.summary.lines() {
            for wrapped in textwrap::wrap(line, WRAP_WIDTH) {
                out.push_str(&format!("  {}\n", wrapped));
            }
        }
    }
    if !payload.approval_items.is_empty() {
        out.push('\n');
        out.push_str(&format!("  {}\n", style("Please confirm:").bold()));
        for item in &payload.approval_items {
            out.push_str(&format!("    - {}\n", item));
        }
    }
    out
}

/// Ask the operator to approve or reject the gate.
pub fn prompt_for_response(payload: &SuspendPayload) -> Result<HumanResponse> {
    println!("{}", render_payload(payload));

    let choices = ["Approve", "Reject with feedback (re-run phase)", "Reject"];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Decision for {}", payload.gate_id))
        .items(&choices)
        .default(0)
        .interact()
        .context("Failed to read gate decision")?;

    match choice {
        0 => Ok(HumanResponse::approve()),
        1 => {
            let feedback: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Feedback for the re-run")
                .interact_text()
                .context("Failed to read feedback")?;
            Ok(HumanResponse::reject(Some(&feedback)))
        }
        _ => Ok(HumanResponse::reject(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateId;
    use uuid::Uuid;

    #[test]
    fn test_render_payload_includes_items() {
        let payload = SuspendPayload {
            gate_id: GateId::Strategy,
            action: GateAction::RequireHuman,
            summary: "핵심 메시지: 안정적 전환".into(),
            approval_items: vec!["인력 배정".into()],
            reason: "전략 승인은 항상 사람이 해야 합니다.".into(),
            ticket: Uuid::new_v4(),
        };
        let rendered = console::strip_ansi_codes(&render_payload(&payload)).to_string();
        assert!(rendered.contains("gate #3 Strategy approval"));
        assert!(rendered.contains("핵심 메시지: 안정적 전환"));
        assert!(rendered.contains("- 인력 배정"));
    }
}
