//! Plain-text reports for `status` and `list`.

use crate::checkpoint::CheckpointInfo;
use crate::state::{RunStatus, WorkflowState};
use console::style;
use std::fmt::Write;

/// Nodes shown in the token usage breakdown.
const TOP_USAGE_NODES: usize = 3;

fn styled_status(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => style(status).green().to_string(),
        RunStatus::Failed => style(status).red().to_string(),
        RunStatus::Suspended => style(status).yellow().to_string(),
        RunStatus::Running => style(status).cyan().to_string(),
    }
}

pub fn render_status(state: &WorkflowState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Workflow {}", style(state.workflow_id).bold());
    let _ = writeln!(out, "  Status:     {}", styled_status(state.status()));
    let _ = writeln!(
        out,
        "  Phase:      {} ({})",
        state.current_phase,
        state.current_phase.display_name()
    );
    if let Some(node) = state.cursor {
        let _ = writeln!(out, "  Next node:  {}", node);
    }
    let _ = writeln!(out, "  Express:    {}", state.express_mode);
    let _ = writeln!(
        out,
        "  Updated:    {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "  Checkpoint: #{}", state.checkpoint_seq);

    if let Some(reason) = &state.failure {
        let _ = writeln!(out, "  Failure:    {}", style(reason).red());
    }
    if let Some(payload) = &state.suspended {
        let _ = writeln!(
            out,
            "  Waiting at: gate #{} ({}), ticket {}",
            payload.gate_id.number(),
            payload.action,
            payload.ticket
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Artifacts ({}/4)", state.artifacts.len());
    for artifact in state.artifacts.iter() {
        let _ = writeln!(
            out,
            "  {}. {} (~{} tokens)",
            artifact.slot(),
            artifact.id(),
            artifact.estimated_tokens()
        );
    }

    if !state.hitl_log.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Gates");
        for record in &state.hitl_log {
            let response = match &record.response {
                Some(r) if r.approved => "approved".to_string(),
                Some(r) => match r.feedback_text() {
                    Some(f) => format!("rejected: {}", f),
                    None => "rejected".to_string(),
                },
                None if record.ticket.is_some() => "pending".to_string(),
                None => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "  #{} {:<16} {}",
                record.gate_id.number(),
                record.decision.action,
                response
            );
        }
    }

    if !state.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors ({}, {} retries)", state.errors.len(), state.retry_count);
        for e in &state.errors {
            let _ = writeln!(out, "  [{}] {}: {}", e.node, e.kind, e.message);
        }
    }

    if !state.usage.is_empty() {
        let totals = state.usage.totals();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Tokens: {} in / {} out ({} total)",
            totals.input_tokens,
            totals.output_tokens,
            totals.total()
        );
        for (node, tokens) in state.usage.top_nodes(TOP_USAGE_NODES) {
            let _ = writeln!(out, "  {:<20} {}", node.to_string(), tokens);
        }
    }

    out
}

pub fn render_listing(infos: &[CheckpointInfo]) -> String {
    if infos.is_empty() {
        return "No workflows found.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<38} {:<10} {:<10} {:<6} Updated",
        "Workflow", "Status", "Phase", "Gate"
    );
    for info in infos {
        let gate = info
            .suspended_gate
            .map(|g| format!("#{}", g))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<38} {:<10} {:<10} {:<6} {}",
            info.workflow_id.to_string(),
            info.status.to_string(),
            info.current_phase.to_string(),
            gate,
            info.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TokenUsage;
    use crate::errors::ErrorKind;
    use crate::graph::NodeId;
    use crate::state::WorkflowInput;

    #[test]
    fn test_status_of_new_workflow() {
        let state = WorkflowState::new(WorkflowInput::default(), true);
        let text = console::strip_ansi_codes(&render_status(&state)).to_string();
        assert!(text.contains(&state.workflow_id.to_string()));
        assert!(text.contains("Status:     running"));
        assert!(text.contains("Next node:  research"));
        assert!(text.contains("Artifacts (0/4)"));
        assert!(!text.contains("Tokens:"));
    }

    #[test]
    fn test_status_shows_errors_and_usage() {
        let mut state = WorkflowState::new(WorkflowInput::default(), false);
        state.push_error(NodeId::Plan, ErrorKind::Timeout, "agent timed out");
        state.usage.record(
            NodeId::Plan,
            TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
        );
        state.fail("stopped");

        let text = console::strip_ansi_codes(&render_status(&state)).to_string();
        assert!(text.contains("Failure:    stopped"));
        assert!(text.contains("[plan] timeout: agent timed out"));
        assert!(text.contains("Tokens: 100 in / 50 out (150 total)"));
    }

    #[test]
    fn test_listing() {
        assert_eq!(render_listing(&[]), "No workflows found.\n");

        let state = WorkflowState::new(WorkflowInput::default(), false);
        let text = render_listing(&[CheckpointInfo::from_state(&state)]);
        assert!(text.contains(&state.workflow_id.to_string()));
        assert!(text.contains("running"));
    }
}
