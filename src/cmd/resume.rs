//! Answering a suspended gate: `bidforge resume`.

use anyhow::{Context, Result};
use std::path::Path;
use uuid::Uuid;

use bidforge::checkpoint::{CheckpointStore, FileCheckpointStore};
use bidforge::config::BidforgeConfig;
use bidforge::gates::{HumanResponse, prompt_for_response};

use super::super::Cli;
use super::run::{Session, answer_interactively, check_run_prerequisites, report_outcome};

/// How the operator answers the gate.
pub enum ResumeDecision {
    Approve,
    Reject(Option<String>),
    /// Show the gate and ask, then keep asking at later gates.
    Prompt,
}

pub struct ResumeOptions {
    pub workflow_id: Uuid,
    pub gate: u8,
    pub ticket: Option<Uuid>,
    pub decision: ResumeDecision,
    pub offline: bool,
    pub agent_timeout: Option<u64>,
}

pub async fn cmd_resume(cli: &Cli, project_dir: &Path, options: ResumeOptions) -> Result<()> {
    check_run_prerequisites(project_dir)?;
    let config =
        BidforgeConfig::with_cli_args(project_dir.to_path_buf(), false, options.agent_timeout)?;

    let interactive = matches!(options.decision, ResumeDecision::Prompt);
    let response = match options.decision {
        ResumeDecision::Approve => HumanResponse::approve(),
        ResumeDecision::Reject(feedback) => HumanResponse::reject(feedback.as_deref()),
        ResumeDecision::Prompt => {
            let store = FileCheckpointStore::new(config.checkpoint_dir());
            let state = store
                .load(options.workflow_id)
                .await
                .with_context(|| format!("Failed to load workflow {}", options.workflow_id))?;
            let payload = state.suspended.as_ref().with_context(|| {
                format!(
                    "Workflow {} is not waiting at a gate ({})",
                    options.workflow_id,
                    state.status()
                )
            })?;
            prompt_for_response(payload)?
        }
    };

    let session = Session::open(&config, options.offline, cli.verbose)?;
    let result = session
        .engine
        .resume(options.workflow_id, options.gate, options.ticket, response)
        .await;
    session.close().await;
    let (mut state, outcome) = result?;

    let outcome = if interactive {
        answer_interactively(cli, &config, options.offline, &mut state, outcome).await?
    } else {
        outcome
    };
    report_outcome(&state, &outcome, !interactive)
}
