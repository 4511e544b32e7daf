//! Workflow engine: drives one `WorkflowState` through the compiled graph.
//!
//! The engine is the single writer of the state. Each step runs exactly one
//! node, merges the node's result, moves the cursor and saves a checkpoint,
//! so a process restart resumes at a node boundary and never mid-node.
//!
//! Gates that need a human park the run: the engine stores a
//! [`SuspendPayload`] carrying a fresh ticket, checkpoints and returns
//! [`RunOutcome::Suspended`]. [`WorkflowEngine::resume`] validates the
//! response against the pending gate before touching anything, so a stale
//! or repeated resume is rejected and leaves the stored state as it was.

use super::builder::{Branch, CompiledGraph, Target, workflow_graph};
use super::node::{NodeId, NodeKind};
use crate::checkpoint::{CheckpointInfo, CheckpointStore};
use crate::compaction::{ArtifactBudgets, compress};
use crate::errors::{EngineError, ErrorKind, GateError};
use crate::executor::{PhaseExecutor, PhaseInput};
use crate::gates::{GateAction, GateId, GatePolicy, HumanResponse, SuspendPayload, evaluate_gate};
use crate::phase::PhaseId;
use crate::quality::{QualityPolicy, QualityRoute, decide_quality_action};
use crate::state::{
    DomainContext, HitlRecord, RunStatus, WorkflowInput, WorkflowState, WorkingState,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Graph-level retries of a degraded agent attempt.
pub const DEFAULT_MAX_PHASE_RETRIES: u32 = 1;
/// Human-driven re-runs allowed per phase.
pub const DEFAULT_MAX_REJECTION_RERUNS: u32 = 3;

/// Tunables the engine applies while walking the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub budgets: ArtifactBudgets,
    pub gates: GatePolicy,
    pub quality: QualityPolicy,
    pub max_phase_retries: u32,
    pub max_rejection_reruns: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            budgets: ArtifactBudgets::default(),
            gates: GatePolicy::default(),
            quality: QualityPolicy::default(),
            max_phase_retries: DEFAULT_MAX_PHASE_RETRIES,
            max_rejection_reruns: DEFAULT_MAX_REJECTION_RERUNS,
        }
    }
}

/// Progress events for a terminal UI or any other observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    NodeStarted {
        node: NodeId,
        phase: PhaseId,
    },
    NodeCompleted {
        node: NodeId,
        /// The node will run again after a degraded agent attempt.
        retrying: bool,
    },
    GateEvaluated {
        gate: u8,
        action: GateAction,
        reason: String,
    },
    Suspended {
        payload: SuspendPayload,
    },
    Finished {
        workflow_id: Uuid,
        status: RunStatus,
    },
}

/// Where a run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Parked at a gate until a human responds.
    Suspended(SuspendPayload),
    Completed,
    Failed(String),
}

/// What a single node asks the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Advance(Option<Branch>),
    /// Run the same node again.
    Retry,
    Suspend,
}

pub struct WorkflowEngine {
    graph: CompiledGraph,
    executor: PhaseExecutor,
    store: Arc<dyn CheckpointStore>,
    settings: EngineSettings,
    /// One writer per workflow id.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    event_tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl WorkflowEngine {
    pub fn new(
        executor: PhaseExecutor,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            graph: workflow_graph()?,
            executor,
            store,
            settings: EngineSettings::default(),
            locks: Mutex::new(HashMap::new()),
            event_tx: None,
        })
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<WorkflowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Create a workflow, checkpoint it and run until it parks or ends.
    pub async fn start(
        &self,
        input: WorkflowInput,
        express_mode: bool,
    ) -> Result<(WorkflowState, RunOutcome), EngineError> {
        let mut state = WorkflowState::new(input, express_mode);
        info!(
            workflow_id = %state.workflow_id,
            express_mode,
            "starting workflow"
        );
        self.checkpoint(&mut state).await?;
        let outcome = self.run(&mut state).await?;
        Ok((state, outcome))
    }

    /// Advance `state` from its cursor until it suspends or reaches a
    /// terminal phase. Already settled states return immediately.
    pub async fn run(&self, state: &mut WorkflowState) -> Result<RunOutcome, EngineError> {
        let workflow_id = state.workflow_id;
        let lock = self.lock_for(workflow_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            let span = info_span!("workflow", %workflow_id);
            self.drive(state).instrument(span).await
        };
        self.release(workflow_id, lock).await;
        outcome
    }

    /// Load a stored workflow and answer its pending gate.
    pub async fn resume(
        &self,
        workflow_id: Uuid,
        gate: u8,
        ticket: Option<Uuid>,
        response: HumanResponse,
    ) -> Result<(WorkflowState, RunOutcome), EngineError> {
        let lock = self.lock_for(workflow_id).await;
        let result = async {
            let _guard = lock.lock().await;
            let mut state = self.store.load(workflow_id).await?;
            let span = info_span!("workflow", %workflow_id);
            let outcome = self
                .resume_locked(&mut state, gate, ticket, response)
                .instrument(span)
                .await?;
            Ok::<_, EngineError>((state, outcome))
        }
        .await;
        self.release(workflow_id, lock).await;
        result
    }

    /// Answer the pending gate of an in-memory state.
    pub async fn resume_state(
        &self,
        state: &mut WorkflowState,
        gate: u8,
        ticket: Option<Uuid>,
        response: HumanResponse,
    ) -> Result<RunOutcome, EngineError> {
        let workflow_id = state.workflow_id;
        let lock = self.lock_for(workflow_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            let span = info_span!("workflow", %workflow_id);
            self.resume_locked(state, gate, ticket, response)
                .instrument(span)
                .await
        };
        self.release(workflow_id, lock).await;
        outcome
    }

    pub async fn load(&self, workflow_id: Uuid) -> Result<WorkflowState, EngineError> {
        Ok(self.store.load(workflow_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<CheckpointInfo>, EngineError> {
        Ok(self.store.list().await?)
    }

    /// Save `state`. The sequence number only moves when the save succeeds,
    /// so a failed save leaves the in-memory state as it was.
    pub async fn checkpoint(&self, state: &mut WorkflowState) -> Result<(), EngineError> {
        state.touch();
        state.checkpoint_seq += 1;
        if let Err(e) = self.store.save(state.workflow_id, state).await {
            state.checkpoint_seq -= 1;
            warn!(error = %e, "checkpoint save failed");
            return Err(e.into());
        }
        debug!(seq = state.checkpoint_seq, "checkpoint saved");
        Ok(())
    }

    async fn lock_for(&self, workflow_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(workflow_id).or_default().clone()
    }

    /// Drop the map entry for `workflow_id` once no other call holds or
    /// waits on its lock.
    async fn release(&self, workflow_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference lives in the map, the other is `lock`.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(&workflow_id);
        }
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn emit(&self, event: WorkflowEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).await.ok();
        }
    }

    async fn drive(&self, state: &mut WorkflowState) -> Result<RunOutcome, EngineError> {
        loop {
            if let Some(outcome) = settled(state) {
                return Ok(outcome);
            }
            let Some(node) = state.cursor else {
                let reason = format!("running workflow in {} has no cursor", state.current_phase);
                return self.abort(state, None, reason).await;
            };
            match self.step(state, node).await {
                Ok(()) => {}
                Err(EngineError::InvariantViolation(reason)) => {
                    return self.abort(state, Some(node), reason).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn step(&self, state: &mut WorkflowState, node: NodeId) -> Result<(), EngineError> {
        state.current_phase = node.phase();
        self.emit(WorkflowEvent::NodeStarted {
            node,
            phase: state.current_phase,
        })
        .await;
        debug!(%node, attempt = state.node_attempts + 1, "entering node");

        let step = match node.kind() {
            NodeKind::Execute(phase) => self.execute_node(state, node, phase).await?,
            NodeKind::Compress(phase) => self.compress_node(state, node, phase)?,
            NodeKind::Gate(gate) => self.gate_node(state, node, gate).await?,
        };
        if let Step::Advance(branch) = step {
            self.advance(state, node, branch)?;
        }
        self.checkpoint(state).await?;

        self.emit(WorkflowEvent::NodeCompleted {
            node,
            retrying: step == Step::Retry,
        })
        .await;
        if let Some(payload) = state.suspended.clone() {
            self.emit(WorkflowEvent::Suspended { payload }).await;
        } else if state.is_terminal() {
            self.emit_finished(state).await;
        }
        Ok(())
    }

    async fn execute_node(
        &self,
        state: &mut WorkflowState,
        node: NodeId,
        phase: PhaseId,
    ) -> Result<Step, EngineError> {
        check_working_owner(&state.working_state, phase)?;

        let prior = phase.input_slot().and_then(|slot| state.artifacts.get(slot));
        let input = PhaseInput {
            phase,
            prior,
            context: DomainContext::for_phase(phase, &state.input, state.pending_feedback.clone()),
            rfp_ref: &state.input.rfp_ref,
            quality: state.working_state.quality(),
        };
        let update = self.executor.execute(input).await?;

        if let Some(err) = &update.error {
            state.push_error(node, err.kind(), err.to_string());
        }
        if let Some(usage) = update.usage {
            state.usage.record(node, usage);
        }
        if update.is_degraded() && state.node_attempts < self.settings.max_phase_retries {
            state.node_attempts += 1;
            state.retry_count += 1;
            warn!(%node, attempt = state.node_attempts, "degraded attempt, retrying node");
            state.push_log(node, format!("{}, retrying", update.log));
            return Ok(Step::Retry);
        }

        state.working_state = update.working;
        state.push_log(node, update.log);
        if let Some(domain_update) = update.domain_update {
            domain_update.apply(&mut state.domain_state);
        }
        state.pending_feedback = None;

        if phase != PhaseId::Critique {
            return Ok(Step::Advance(None));
        }

        let quality = state.working_state.quality_mut().ok_or_else(|| {
            EngineError::InvariantViolation("critique produced no quality working state".into())
        })?;
        let route = decide_quality_action(&quality.loop_state, &self.settings.quality);
        quality.route = Some(route);
        let decision = format!(
            "quality route {}: score {:.2}, round {}, {} structural issues",
            route,
            quality.loop_state.score,
            quality.loop_state.revision_rounds,
            quality.loop_state.structural_issues.len()
        );
        info!(%route, "{}", decision);
        state.push_decision(node, decision);

        let branch = match route {
            QualityRoute::Pass => Branch::Pass,
            QualityRoute::Revise => Branch::Revise,
            QualityRoute::Escalate => Branch::Escalate,
        };
        Ok(Step::Advance(Some(branch)))
    }

    fn compress_node(
        &self,
        state: &mut WorkflowState,
        node: NodeId,
        phase: PhaseId,
    ) -> Result<Step, EngineError> {
        let working = std::mem::take(&mut state.working_state);
        let compressed = compress(phase, working, &self.settings.budgets)
            .map_err(EngineError::InvariantViolation)?;

        compressed.domain_update.apply(&mut state.domain_state);
        let artifact = compressed.artifact;
        let message = if compressed.dropped_items > 0 {
            format!(
                "sealed {} (~{} tokens, {} list items dropped to fit the budget)",
                artifact.id(),
                artifact.estimated_tokens(),
                compressed.dropped_items
            )
        } else {
            format!(
                "sealed {} (~{} tokens)",
                artifact.id(),
                artifact.estimated_tokens()
            )
        };
        info!(%node, "{}", message);
        state.push_log(node, message);
        state.staged_artifact = Some(artifact);
        Ok(Step::Advance(None))
    }

    async fn gate_node(
        &self,
        state: &mut WorkflowState,
        node: NodeId,
        gate: GateId,
    ) -> Result<Step, EngineError> {
        let decision = evaluate_gate(gate, state, &self.settings.gates);
        info!(
            gate = gate.number(),
            action = %decision.action,
            reason = %decision.reason,
            "gate evaluated"
        );
        self.emit(WorkflowEvent::GateEvaluated {
            gate: gate.number(),
            action: decision.action,
            reason: decision.reason.clone(),
        })
        .await;

        if !decision.action.suspends() {
            state.push_log(node, format!("{} passed: {}", gate, decision.reason));
            state.hitl_log.push(HitlRecord {
                gate_id: gate,
                decision,
                ticket: None,
                response: None,
                evaluated_at: Utc::now(),
                responded_at: None,
            });
            commit_staged(state, gate)?;
            return Ok(Step::Advance(Some(Branch::Proceed)));
        }

        let ticket = Uuid::new_v4();
        let payload = SuspendPayload::from_decision(&decision, ticket);
        state.push_log(
            node,
            format!("suspended at {} ({}): {}", gate, decision.action, decision.reason),
        );
        state.hitl_log.push(HitlRecord {
            gate_id: gate,
            decision,
            ticket: Some(ticket),
            response: None,
            evaluated_at: Utc::now(),
            responded_at: None,
        });
        state.suspended = Some(payload);
        Ok(Step::Suspend)
    }

    async fn resume_locked(
        &self,
        state: &mut WorkflowState,
        gate: u8,
        ticket: Option<Uuid>,
        response: HumanResponse,
    ) -> Result<RunOutcome, EngineError> {
        let gate = validate_resume(state, gate, ticket)?;
        let node = NodeId::for_gate(gate);
        info!(gate = gate.number(), approved = response.approved, "resuming workflow");

        if let Some(record) = state.pending_hitl_mut() {
            record.response = Some(response.clone());
            record.responded_at = Some(Utc::now());
        }
        state.suspended = None;

        let routed = self
            .route_response(state, node, gate, &response)
            .and_then(|branch| self.advance(state, node, Some(branch)));
        match routed {
            Ok(()) => {}
            Err(EngineError::InvariantViolation(reason)) => {
                return self.abort(state, Some(node), reason).await;
            }
            Err(e) => return Err(e),
        }

        self.checkpoint(state).await?;
        if state.is_terminal() {
            self.emit_finished(state).await;
        }
        self.drive(state).await
    }

    /// Pick the branch out of a gate for a human response.
    fn route_response(
        &self,
        state: &mut WorkflowState,
        node: NodeId,
        gate: GateId,
        response: &HumanResponse,
    ) -> Result<Branch, EngineError> {
        if response.approved {
            state.push_log(node, format!("{} approved", gate));
            commit_staged(state, gate)?;
            return Ok(if gate == GateId::Final {
                Branch::Complete
            } else {
                Branch::Proceed
            });
        }

        if response.requests_rerun() {
            let feedback = response.feedback_text().map(str::to_string);
            let phase = gate.rerun_phase();
            let reruns = state.rerun_counts.entry(phase).or_insert(0);
            *reruns += 1;
            let reruns = *reruns;

            if reruns > self.settings.max_rejection_reruns {
                let reason = format!(
                    "{} rejected {} times; re-run limit of {} reached",
                    phase, reruns, self.settings.max_rejection_reruns
                );
                warn!(%phase, reruns, "re-run limit reached");
                state.push_error(node, ErrorKind::RerunLimit, reason.clone());
                state.failure = Some(reason);
                return Ok(Branch::Fail);
            }

            state.staged_artifact = None;
            if gate == GateId::Final {
                state.working_state = WorkingState::Empty;
            }
            state.pending_feedback = feedback;
            state.push_log(
                node,
                format!("{} rejected with feedback, re-running {} ({})", gate, phase, reruns),
            );
            return Ok(Branch::Rerun);
        }

        if gate == GateId::Final {
            state.push_log(node, "final approval declined");
            state.failure = Some("final approval declined".to_string());
            return Ok(Branch::Fail);
        }

        state.push_log(node, format!("{} rejected without feedback, proceeding", gate));
        commit_staged(state, gate)?;
        Ok(Branch::Proceed)
    }

    fn advance(
        &self,
        state: &mut WorkflowState,
        node: NodeId,
        branch: Option<Branch>,
    ) -> Result<(), EngineError> {
        let target = self.graph.next(node, branch)?;
        state.node_attempts = 0;
        match target {
            Target::Node(next) => {
                debug!(from = %node, to = %next, "advancing");
                state.cursor = Some(next);
            }
            Target::End(PhaseId::Completed) => {
                info!("workflow completed");
                state.complete();
            }
            Target::End(_) => {
                let reason = state
                    .failure
                    .clone()
                    .unwrap_or_else(|| format!("workflow ended at {}", node));
                info!(%reason, "workflow failed");
                state.fail(reason);
            }
        }
        Ok(())
    }

    /// Park the run in `Error` after a broken invariant and surface it.
    async fn abort(
        &self,
        state: &mut WorkflowState,
        node: Option<NodeId>,
        reason: String,
    ) -> Result<RunOutcome, EngineError> {
        error!(%reason, "invariant violated, failing workflow");
        if let Some(node) = node {
            state.push_error(node, ErrorKind::Invariant, reason.clone());
        }
        state.fail(reason.clone());
        self.checkpoint(state).await?;
        self.emit_finished(state).await;
        Err(EngineError::InvariantViolation(reason))
    }

    async fn emit_finished(&self, state: &WorkflowState) {
        self.emit(WorkflowEvent::Finished {
            workflow_id: state.workflow_id,
            status: state.status(),
        })
        .await;
    }
}

/// Check a resume request against the pending gate without changing anything.
pub fn validate_resume(
    state: &WorkflowState,
    gate: u8,
    ticket: Option<Uuid>,
) -> Result<GateId, GateError> {
    if state.is_terminal() {
        return Err(GateError::AlreadyTerminal {
            workflow_id: state.workflow_id,
            phase: state.current_phase,
        });
    }
    let requested = GateId::try_from(gate)?;
    let Some(pending) = state.suspended.as_ref() else {
        return Err(GateError::NotSuspended {
            workflow_id: state.workflow_id,
            phase: state.current_phase,
        });
    };
    if pending.gate_id != requested {
        return Err(GateError::GateMismatch {
            workflow_id: state.workflow_id,
            pending: pending.gate_id.number(),
            requested: gate,
        });
    }
    if let Some(supplied) = ticket
        && supplied != pending.ticket
    {
        return Err(GateError::StaleTicket { gate, supplied });
    }
    Ok(requested)
}

fn settled(state: &WorkflowState) -> Option<RunOutcome> {
    match state.current_phase {
        PhaseId::Completed => Some(RunOutcome::Completed),
        PhaseId::Error => Some(RunOutcome::Failed(
            state.failure.clone().unwrap_or_default(),
        )),
        _ => state.suspended.clone().map(RunOutcome::Suspended),
    }
}

/// A phase may only start on an empty working area or on its own leftovers.
fn check_working_owner(working: &WorkingState, phase: PhaseId) -> Result<(), EngineError> {
    match working.owner() {
        None => Ok(()),
        Some(owner) if owner == phase => Ok(()),
        Some(owner) if owner.is_quality_phase() && phase.is_quality_phase() => Ok(()),
        Some(owner) => Err(EngineError::InvariantViolation(format!(
            "{} cannot start while {} owns the working state",
            phase, owner
        ))),
    }
}

/// Move the staged artifact of gates 1-4 onto the chain.
fn commit_staged(state: &mut WorkflowState, gate: GateId) -> Result<(), EngineError> {
    if gate == GateId::Final {
        return Ok(());
    }
    let artifact = state.staged_artifact.take().ok_or_else(|| {
        EngineError::InvariantViolation(format!("{} has no staged artifact to commit", gate))
    })?;
    let id = artifact.id().clone();
    state
        .artifacts
        .commit(artifact)
        .map_err(EngineError::InvariantViolation)?;
    debug!(artifact = %id, "artifact committed");
    Ok(())
}
