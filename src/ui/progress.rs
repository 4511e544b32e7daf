use crate::gates::GateAction;
use crate::graph::{NodeId, NodeKind, WorkflowEvent};
use crate::phase::PhaseId;
use crate::state::RunStatus;
use crate::ui::icons::{CHECK, CROSS, GATE, PAUSE, RETRY, RUNNING, SPARKLE};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Number of pipeline phases shown on the phase bar.
const PIPELINE_PHASES: u64 = 5;

/// Terminal UI for a workflow run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Phase bar: pipeline position (1-5)
/// - Node bar: spinner naming the node currently running
///
/// Feed it [`WorkflowEvent`]s from the engine's event channel.
pub struct WorkflowUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    node_bar: ProgressBar,
    verbose: bool,
}

impl WorkflowUI {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(PIPELINE_PHASES));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let node_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let node_bar = multi.add(ProgressBar::new_spinner());
        node_bar.set_style(node_style);
        node_bar.set_prefix("  Node");

        Self {
            multi,
            phase_bar,
            node_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn handle(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::NodeStarted { node, phase } => self.node_started(*node, *phase),
            WorkflowEvent::NodeCompleted { node, retrying } => {
                if *retrying {
                    self.print_line(format!(
                        "    {} {} degraded, retrying",
                        RETRY,
                        style(node).yellow()
                    ));
                } else if self.verbose {
                    self.print_line(format!("    {} {}", style("→").dim(), style(node).dim()));
                }
            }
            WorkflowEvent::GateEvaluated {
                gate,
                action,
                reason,
            } => {
                let action_label = match action {
                    GateAction::AutoPass => style(action.to_string()).green(),
                    GateAction::RecommendHuman => style(action.to_string()).yellow(),
                    GateAction::RequireHuman => style(action.to_string()).red(),
                };
                self.print_line(format!(
                    "  {} Gate #{} {}: {}",
                    GATE, gate, action_label, reason
                ));
            }
            WorkflowEvent::Suspended { payload } => {
                self.node_bar.finish_with_message(format!(
                    "{} Waiting for a human at gate #{}",
                    PAUSE,
                    payload.gate_id.number()
                ));
            }
            WorkflowEvent::Finished { status, .. } => self.finished(*status),
        }
    }

    fn node_started(&self, node: NodeId, phase: PhaseId) {
        if let Some(number) = phase.number() {
            self.phase_bar.set_position(u64::from(number.saturating_sub(1)));
            self.phase_bar.set_message(format!(
                "{}: {}",
                style(number).yellow(),
                phase.display_name()
            ));
        }
        let label = match node.kind() {
            NodeKind::Execute(_) => format!("{} running {}", RUNNING, style(node).cyan()),
            NodeKind::Compress(_) => format!("compressing {}", style(phase).cyan()),
            NodeKind::Gate(gate) => format!("evaluating {}", style(gate).cyan()),
        };
        self.node_bar.set_message(label);
        self.node_bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn finished(&self, status: RunStatus) {
        match status {
            RunStatus::Completed => {
                self.phase_bar.set_position(PIPELINE_PHASES);
                self.phase_bar
                    .finish_with_message(format!("{} Proposal approved", SPARKLE));
                self.node_bar
                    .finish_with_message(format!("{} Workflow completed", CHECK));
            }
            _ => {
                self.phase_bar.abandon();
                self.node_bar
                    .finish_with_message(format!("{} Workflow {}", CROSS, status));
            }
        }
    }

    /// Stop any spinner still ticking.
    pub fn finish(&self) {
        if !self.node_bar.is_finished() {
            self.node_bar.finish_and_clear();
        }
        if !self.phase_bar.is_finished() {
            self.phase_bar.abandon();
        }
    }
}
