//! Quality router for the terminal critique/revise/finalize loop.
//!
//! The router is a pure decision table over the loop state:
//!
//! | Condition                      | Route      |
//! |--------------------------------|------------|
//! | any structural issue           | `Escalate` |
//! | `score >= pass_threshold`      | `Pass`     |
//! | `rounds >= max_revision_rounds`| `Escalate` |
//! | otherwise                      | `Revise`   |
//!
//! `Pass` continues to finalize, `Revise` to another revision attempt, and
//! `Escalate` straight to the final human gate.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PASS_THRESHOLD: f32 = 0.75;
pub const DEFAULT_MAX_REVISION_ROUNDS: u32 = 3;
pub const DEFAULT_FALLBACK_SCORE_STEP: f32 = 0.05;

/// Score, revision count and structural findings for the current draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityLoopState {
    pub score: f32,
    pub revision_rounds: u32,
    #[serde(default)]
    pub structural_issues: Vec<String>,
}

impl QualityLoopState {
    pub fn new(score: f32, revision_rounds: u32, structural_issues: Vec<String>) -> Self {
        Self {
            score,
            revision_rounds,
            structural_issues,
        }
    }

    /// Record a revision attempt with an agent-supplied score.
    pub fn record_revision(&mut self, new_score: f32) {
        self.revision_rounds += 1;
        self.score = new_score.clamp(0.0, 1.0);
    }

    /// Placeholder re-score used when no agent score is available: one more
    /// round and a small fixed bump, capped at 1.0.
    pub fn nudge(&mut self, step: f32) {
        let bumped = self.score + step;
        self.record_revision(bumped.min(1.0));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRoute {
    Pass,
    Revise,
    Escalate,
}

impl fmt::Display for QualityRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Revise => write!(f, "revise"),
            Self::Escalate => write!(f, "escalate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityPolicy {
    pub pass_threshold: f32,
    pub max_revision_rounds: u32,
    pub fallback_score_step: f32,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            max_revision_rounds: DEFAULT_MAX_REVISION_ROUNDS,
            fallback_score_step: DEFAULT_FALLBACK_SCORE_STEP,
        }
    }
}

pub fn decide_quality_action(state: &QualityLoopState, policy: &QualityPolicy) -> QualityRoute {
    if !state.structural_issues.is_empty() {
        return QualityRoute::Escalate;
    }
    if state.score >= policy.pass_threshold {
        return QualityRoute::Pass;
    }
    if state.revision_rounds >= policy.max_revision_rounds {
        return QualityRoute::Escalate;
    }
    QualityRoute::Revise
}
