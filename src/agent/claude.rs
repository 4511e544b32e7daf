//! Agent backed by the Claude CLI.
//!
//! Each invocation spawns `claude --print --output-format json`, writes the
//! prompt to stdin and decodes the JSON envelope the CLI prints on exit. The
//! child is killed if the invocation future is dropped, so a timeout in the
//! executor never leaves a stray process behind.

use super::parse::parse_output;
use super::{AgentPort, AgentRequest, AgentResponse, TokenUsage};
use crate::errors::AgentError;
use crate::phase::PhaseId;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct ClaudeAgent {
    claude_cmd: String,
    model: String,
}

/// Final envelope printed by `--output-format json`.
#[derive(Debug, Deserialize)]
struct CliEnvelope {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    usage: Option<CliUsage>,
}

#[derive(Debug, Deserialize)]
struct CliUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl ClaudeAgent {
    pub fn new(claude_cmd: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            claude_cmd: claude_cmd.into(),
            model: model.into(),
        }
    }

    fn flags(&self) -> Vec<String> {
        vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--model".to_string(),
            self.model.clone(),
        ]
    }

    async fn run_cli(&self, phase: PhaseId, prompt: &str) -> Result<String, AgentError> {
        let upstream = |message: String| AgentError::UpstreamFailure { phase, message };

        let mut child = Command::new(&self.claude_cmd)
            .args(self.flags())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| upstream(format!("failed to spawn {}: {}", self.claude_cmd, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| upstream(format!("failed to write prompt: {}", e)))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| upstream(format!("failed to close stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| upstream(format!("failed to wait for claude: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(upstream(format!(
                "claude exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AgentPort for ClaudeAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        let phase = request.phase;
        let prompt = build_prompt(&request).map_err(|e| AgentError::UpstreamFailure {
            phase,
            message: format!("failed to encode request: {}", e),
        })?;
        debug!(%phase, chars = prompt.len(), "invoking claude");

        let stdout = self.run_cli(phase, &prompt).await?;
        decode_envelope(phase, &stdout)
    }
}

/// Decode the CLI envelope, falling back to treating stdout as the answer.
fn decode_envelope(phase: PhaseId, stdout: &str) -> Result<AgentResponse, AgentError> {
    let envelope = match serde_json::from_str::<CliEnvelope>(stdout.trim()) {
        Ok(envelope) if envelope.result.is_some() || envelope.is_error => envelope,
        _ => return parse_output(phase, stdout).map(AgentResponse::new),
    };
    let text = envelope.result.unwrap_or_default();
    if envelope.is_error {
        return Err(AgentError::UpstreamFailure {
            phase,
            message: if text.is_empty() {
                "claude reported an error".to_string()
            } else {
                text
            },
        });
    }
    let mut response = AgentResponse::new(parse_output(phase, &text)?);
    if let Some(usage) = envelope.usage {
        response = response.with_usage(TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        });
    }
    Ok(response)
}

fn phase_instructions(phase: PhaseId) -> &'static str {
    match phase {
        PhaseId::Research => {
            "Parse the RFP. Return rfp_title, client_name, submission_deadline, budget_range, \
             page_limit, evaluation_method, mandatory_requirements, optional_requirements, \
             evaluation_criteria, competition_history, relevant_capabilities, \
             available_personnel_count and past_proposals."
        }
        PhaseId::Analysis => {
            "Assess bid qualification and the competitive landscape. Return \
             qualification_status (met|conditional|unmet), qualification_gaps, our_strengths, \
             our_weaknesses, competitive_landscape, recommended_strategy, risk_factors, \
             implicit_intent, client_priorities, evaluation_criteria, mandatory_requirements, \
             section_allocations [{section, pages}] and total_target_pages."
        }
        PhaseId::Plan => {
            "Build the win strategy. Return core_message, win_themes, differentiators, \
             personnel_assignments [{role, name, grade}], section_plans [{name, key_message, \
             pages}], generation_order and language_guidelines."
        }
        PhaseId::Implement => {
            "Draft every planned section. Return sections [{name, content, summary, pages}], \
             total_pages, required_claims and traceability (0-1)."
        }
        PhaseId::Critique => {
            "Review the draft as an evaluator would. Return quality_score (0-1), critique, \
             major_issues (structural problems only), minor_issues and \
             revision_recommendations."
        }
        PhaseId::Revise => {
            "Revise the sections the critique flagged. Return revised_sections, notes and \
             the re-evaluated quality_score (0-1)."
        }
        PhaseId::Finalize => {
            "Assemble the final proposal. Return executive_summary and document_ref."
        }
        PhaseId::Completed | PhaseId::Error => "No work is required.",
    }
}

fn build_prompt(request: &AgentRequest) -> Result<String, serde_json::Error> {
    let mut prompt = format!(
        "You are working on the {} phase of a bid proposal.\n\n{}\n\n\
         Respond with a single JSON object in a ```json fenced block.\n",
        request.phase.display_name(),
        phase_instructions(request.phase)
    );

    if let Some(artifact) = &request.input_artifact {
        prompt.push_str("\n## Input artifact\n```json\n");
        prompt.push_str(&serde_json::to_string_pretty(artifact)?);
        prompt.push_str("\n```\n");
    }
    if let Some(quality) = &request.quality {
        prompt.push_str(&format!(
            "\n## Quality loop\nscore: {:.2}, revision rounds: {}\n",
            quality.score, quality.revision_rounds
        ));
    }
    if let Some(rfp) = &request.context.rfp_text {
        prompt.push_str("\n## RFP\n");
        prompt.push_str(rfp);
        prompt.push('\n');
    }
    if let Some(profile) = &request.context.company_profile {
        prompt.push_str("\n## Company profile\n");
        prompt.push_str(profile);
        prompt.push('\n');
    }
    if let Some(feedback) = &request.context.feedback {
        prompt.push_str("\n## Reviewer feedback (address this first)\n");
        prompt.push_str(feedback);
        prompt.push('\n');
    }
    Ok(prompt)
}
