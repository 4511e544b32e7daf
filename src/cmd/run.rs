//! Workflow execution: `bidforge run`, plus the engine wiring shared with `resume`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bidforge::agent::{AgentPort, ClaudeAgent, OfflineAgent};
use bidforge::checkpoint::FileCheckpointStore;
use bidforge::config::BidforgeConfig;
use bidforge::executor::PhaseExecutor;
use bidforge::gates::{prompt_for_response, render_payload};
use bidforge::graph::{RunOutcome, WorkflowEngine, WorkflowEvent};
use bidforge::lookup::{InMemoryCatalog, Lookups};
use bidforge::state::{WorkflowInput, WorkflowState};
use bidforge::ui::WorkflowUI;
use bidforge::ui::icons::{CHECK, CROSS, DOCUMENT, PAUSE, WARN};
use console::style;
use tracing::warn;

use super::super::Cli;

/// Buffered progress events between the engine and the terminal UI.
const EVENT_BUFFER: usize = 64;

pub struct RunOptions {
    pub rfp: PathBuf,
    pub company: Option<PathBuf>,
    pub express: bool,
    pub offline: bool,
    pub agent_timeout: Option<u64>,
    pub interactive: bool,
}

pub fn check_run_prerequisites(project_dir: &Path) -> Result<()> {
    if !bidforge::init::is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'bidforge init' first.");
    }
    Ok(())
}

/// An engine whose progress events are drawn by a background UI task.
///
/// The UI task ends once the engine (and with it the event sender) is
/// dropped, so call [`Session::close`] before printing anything else.
pub struct Session {
    pub engine: WorkflowEngine,
    ui: JoinHandle<()>,
}

impl Session {
    pub fn open(config: &BidforgeConfig, offline: bool, verbose: bool) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<WorkflowEvent>(EVENT_BUFFER);
        let engine = build_engine(config, offline)?.with_event_channel(tx);
        let ui = tokio::spawn(async move {
            let ui = WorkflowUI::new(verbose);
            while let Some(event) = rx.recv().await {
                ui.handle(&event);
            }
            ui.finish();
        });
        Ok(Self { engine, ui })
    }

    pub async fn close(self) {
        drop(self.engine);
        if let Err(e) = self.ui.await {
            warn!(error = %e, "progress UI task ended abnormally");
        }
    }
}

pub fn build_engine(config: &BidforgeConfig, offline: bool) -> Result<WorkflowEngine> {
    let agent: Arc<dyn AgentPort> = if offline {
        Arc::new(OfflineAgent)
    } else {
        Arc::new(ClaudeAgent::new(config.claude_cmd(), config.model()))
    };
    let catalog = InMemoryCatalog::load_or_empty(&config.catalog_path())?;
    let executor = PhaseExecutor::new(agent, Lookups::from_catalog(Arc::new(catalog)))
        .with_timeout(config.agent_timeout())
        .with_fallback_score_step(config.toml.quality.fallback_score_step);
    let store = Arc::new(FileCheckpointStore::new(config.checkpoint_dir()));

    let engine = WorkflowEngine::new(executor, store)
        .context("Failed to build the workflow graph")?
        .with_settings(config.engine_settings());
    Ok(engine)
}

/// Read the RFP. Text that is not valid UTF-8 counts as a failed extraction
/// and leaves the workflow with an empty RFP for gate #1 to catch.
fn read_rfp(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read RFP: {}", path.display()))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(_) => {
            warn!(path = %path.display(), "RFP is not UTF-8 text; continuing without it");
            Ok(String::new())
        }
    }
}

pub async fn cmd_run(cli: &Cli, project_dir: &Path, options: RunOptions) -> Result<()> {
    check_run_prerequisites(project_dir)?;

    let config = BidforgeConfig::with_cli_args(
        project_dir.to_path_buf(),
        options.express,
        options.agent_timeout,
    )?;
    for warning in config.validate() {
        println!("{}{}", WARN, style(warning).yellow());
    }

    let company_profile = match &options.company {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read company profile: {}", path.display()))?,
        ),
        None => None,
    };
    let input = WorkflowInput {
        rfp_text: read_rfp(&options.rfp)?,
        rfp_ref: options.rfp.display().to_string(),
        company_profile,
    };

    let session = Session::open(&config, options.offline, cli.verbose)?;
    let result = session.engine.start(input, config.express_mode()).await;
    session.close().await;
    let (mut state, outcome) = result?;

    let outcome = if options.interactive {
        answer_interactively(cli, &config, options.offline, &mut state, outcome).await?
    } else {
        outcome
    };
    report_outcome(&state, &outcome, !options.interactive)
}

/// Prompt at every gate until the workflow completes or fails.
pub async fn answer_interactively(
    cli: &Cli,
    config: &BidforgeConfig,
    offline: bool,
    state: &mut WorkflowState,
    mut outcome: RunOutcome,
) -> Result<RunOutcome> {
    while let RunOutcome::Suspended(payload) = &outcome {
        let response = prompt_for_response(payload)?;
        let gate = payload.gate_id.number();
        let ticket = Some(payload.ticket);

        let session = Session::open(config, offline, cli.verbose)?;
        let result = session
            .engine
            .resume_state(state, gate, ticket, response)
            .await;
        session.close().await;
        outcome = result?;
    }
    Ok(outcome)
}

/// Print how the run ended. A failed workflow is returned as an error so
/// the process exits non-zero.
pub fn report_outcome(
    state: &WorkflowState,
    outcome: &RunOutcome,
    show_payload: bool,
) -> Result<()> {
    println!();
    match outcome {
        RunOutcome::Suspended(payload) => {
            if show_payload {
                println!("{}", render_payload(payload));
            }
            let gate = payload.gate_id.number();
            println!(
                "{} Workflow {} is waiting at gate #{}",
                PAUSE,
                style(state.workflow_id).bold(),
                gate
            );
            println!();
            println!("Resume with:");
            println!(
                "  bidforge resume {} --gate {} --ticket {} --approve",
                state.workflow_id, gate, payload.ticket
            );
            println!(
                "  bidforge resume {} --gate {} --ticket {} --reject --feedback \"...\"",
                state.workflow_id, gate, payload.ticket
            );
            Ok(())
        }
        RunOutcome::Completed => {
            println!(
                "{} Workflow {} completed",
                CHECK,
                style(state.workflow_id).bold()
            );
            if let Some(finalized) = &state.domain_state.finalized {
                println!("  {}{}", DOCUMENT, finalized.document_ref);
            }
            Ok(())
        }
        RunOutcome::Failed(reason) => {
            println!(
                "{} Workflow {} failed: {}",
                CROSS,
                style(state.workflow_id).bold(),
                style(reason).red()
            );
            anyhow::bail!("workflow {} failed: {}", state.workflow_id, reason)
        }
    }
}
