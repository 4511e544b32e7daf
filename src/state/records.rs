//! Append-only audit records kept on the workflow.

use crate::agent::TokenUsage;
use crate::errors::ErrorKind;
use crate::gates::{GateId, HitlDecision, HumanResponse};
use crate::graph::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A gate decision plus the human response, once one arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlRecord {
    pub gate_id: GateId,
    pub decision: HitlDecision,
    /// Set when the decision suspended the workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<HumanResponse>,
    pub evaluated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl HitlRecord {
    pub fn is_pending(&self) -> bool {
        self.ticket.is_some() && self.response.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub node: NodeId,
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// A routing decision taken by the engine (quality route, rerun, retry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub node: NodeId,
    pub decision: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub node: NodeId,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub node: NodeId,
    pub usage: TokenUsage,
}

/// Token usage reported by the agent, per node invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageLedger(Vec<UsageRecord>);

impl UsageLedger {
    pub fn record(&mut self, node: NodeId, usage: TokenUsage) {
        self.0.push(UsageRecord { node, usage });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn totals(&self) -> TokenUsage {
        self.0.iter().fold(TokenUsage::default(), |acc, r| TokenUsage {
            input_tokens: acc.input_tokens + r.usage.input_tokens,
            output_tokens: acc.output_tokens + r.usage.output_tokens,
        })
    }

    /// Nodes ordered by total tokens spent, most expensive first.
    pub fn top_nodes(&self, limit: usize) -> Vec<(NodeId, u64)> {
        let mut per_node: BTreeMap<NodeId, u64> = BTreeMap::new();
        for r in &self.0 {
            *per_node.entry(r.node).or_default() += r.usage.total();
        }
        let mut ranked: Vec<(NodeId, u64)> = per_node.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }
}
