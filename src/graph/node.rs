//! The sixteen executable nodes of the workflow graph.

use crate::gates::GateId;
use crate::phase::PhaseId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Research,
    CompressResearch,
    Gate1,
    Analysis,
    CompressAnalysis,
    Gate2,
    Plan,
    CompressPlan,
    Gate3,
    Implement,
    CompressImplement,
    Gate4,
    Critique,
    Revise,
    Finalize,
    Gate5,
}

/// What a node does when the engine steps onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Execute(PhaseId),
    Compress(PhaseId),
    Gate(GateId),
}

impl NodeId {
    pub const ALL: [NodeId; 16] = [
        NodeId::Research,
        NodeId::CompressResearch,
        NodeId::Gate1,
        NodeId::Analysis,
        NodeId::CompressAnalysis,
        NodeId::Gate2,
        NodeId::Plan,
        NodeId::CompressPlan,
        NodeId::Gate3,
        NodeId::Implement,
        NodeId::CompressImplement,
        NodeId::Gate4,
        NodeId::Critique,
        NodeId::Revise,
        NodeId::Finalize,
        NodeId::Gate5,
    ];

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Research => NodeKind::Execute(PhaseId::Research),
            Self::Analysis => NodeKind::Execute(PhaseId::Analysis),
            Self::Plan => NodeKind::Execute(PhaseId::Plan),
            Self::Implement => NodeKind::Execute(PhaseId::Implement),
            Self::Critique => NodeKind::Execute(PhaseId::Critique),
            Self::Revise => NodeKind::Execute(PhaseId::Revise),
            Self::Finalize => NodeKind::Execute(PhaseId::Finalize),
            Self::CompressResearch => NodeKind::Compress(PhaseId::Research),
            Self::CompressAnalysis => NodeKind::Compress(PhaseId::Analysis),
            Self::CompressPlan => NodeKind::Compress(PhaseId::Plan),
            Self::CompressImplement => NodeKind::Compress(PhaseId::Implement),
            Self::Gate1 => NodeKind::Gate(GateId::Research),
            Self::Gate2 => NodeKind::Gate(GateId::Analysis),
            Self::Gate3 => NodeKind::Gate(GateId::Strategy),
            Self::Gate4 => NodeKind::Gate(GateId::Draft),
            Self::Gate5 => NodeKind::Gate(GateId::Final),
        }
    }

    /// The phase this node belongs to, for `current_phase` bookkeeping.
    pub fn phase(&self) -> PhaseId {
        match self.kind() {
            NodeKind::Execute(p) | NodeKind::Compress(p) => p,
            NodeKind::Gate(GateId::Final) => PhaseId::Finalize,
            NodeKind::Gate(g) => g.rerun_phase(),
        }
    }

    /// Executor node for a phase.
    pub fn for_phase(phase: PhaseId) -> Option<NodeId> {
        match phase {
            PhaseId::Research => Some(Self::Research),
            PhaseId::Analysis => Some(Self::Analysis),
            PhaseId::Plan => Some(Self::Plan),
            PhaseId::Implement => Some(Self::Implement),
            PhaseId::Critique => Some(Self::Critique),
            PhaseId::Revise => Some(Self::Revise),
            PhaseId::Finalize => Some(Self::Finalize),
            PhaseId::Completed | PhaseId::Error => None,
        }
    }

    pub fn for_gate(gate: GateId) -> NodeId {
        match gate {
            GateId::Research => Self::Gate1,
            GateId::Analysis => Self::Gate2,
            GateId::Strategy => Self::Gate3,
            GateId::Draft => Self::Gate4,
            GateId::Final => Self::Gate5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::CompressResearch => "compress_research",
            Self::Gate1 => "gate1",
            Self::Analysis => "analysis",
            Self::CompressAnalysis => "compress_analysis",
            Self::Gate2 => "gate2",
            Self::Plan => "plan",
            Self::CompressPlan => "compress_plan",
            Self::Gate3 => "gate3",
            Self::Implement => "implement",
            Self::CompressImplement => "compress_implement",
            Self::Gate4 => "gate4",
            Self::Critique => "critique",
            Self::Revise => "revise",
            Self::Finalize => "finalize",
            Self::Gate5 => "gate5",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_inventory() {
        let count = |pred: fn(&NodeKind) -> bool| {
            NodeId::ALL.iter().filter(|n| pred(&n.kind())).count()
        };
        assert_eq!(count(|k| matches!(k, NodeKind::Execute(_))), 7);
        assert_eq!(count(|k| matches!(k, NodeKind::Compress(_))), 4);
        assert_eq!(count(|k| matches!(k, NodeKind::Gate(_))), 5);
    }

    #[test]
    fn test_display_matches_serde() {
        for node in NodeId::ALL {
            let json = serde_json::to_string(&node).unwrap();
            assert_eq!(json, format!("\"{}\"", node));
        }
    }

    #[test]
    fn test_gate_nodes_map_back() {
        for gate in GateId::ALL {
            assert_eq!(NodeId::for_gate(gate).kind(), NodeKind::Gate(gate));
        }
    }
}
