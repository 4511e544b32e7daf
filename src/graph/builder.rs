//! Graph builder for the workflow topology.
//!
//! Nodes are declared first, then wired with direct or conditional edges.
//! `compile` validates the wiring and freezes it into a [`CompiledGraph`]
//! the engine walks one node at a time.

use super::node::NodeId;
use crate::errors::GraphError;
use crate::phase::PhaseId;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Label on a conditional edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Branch {
    /// Gate passed or approved.
    Proceed,
    /// Gate rejected with feedback; run the preceding phase again.
    Rerun,
    Pass,
    Revise,
    Escalate,
    /// Final approval given.
    Complete,
    Fail,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Proceed => "proceed",
            Self::Rerun => "rerun",
            Self::Pass => "pass",
            Self::Revise => "revise",
            Self::Escalate => "escalate",
            Self::Complete => "complete",
            Self::Fail => "fail",
        };
        f.write_str(label)
    }
}

/// Where an edge leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    /// Leave the graph in a terminal phase.
    End(PhaseId),
}

#[derive(Debug, Clone)]
enum Edge {
    Direct(Target),
    Conditional(BTreeMap<Branch, Target>),
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeId>,
    edges: BTreeMap<NodeId, Edge>,
    entry: Option<NodeId>,
    errors: Vec<GraphError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, node: NodeId) -> Self {
        if self.nodes.contains(&node) {
            self.errors.push(GraphError::DuplicateNode(node));
        } else {
            self.nodes.push(node);
        }
        self
    }

    pub fn set_entry(mut self, node: NodeId) -> Self {
        self.entry = Some(node);
        self
    }

    pub fn add_edge(mut self, from: NodeId, to: Target) -> Self {
        if self.edges.contains_key(&from) {
            self.errors.push(GraphError::ConflictingEdge(from));
        } else {
            self.edges.insert(from, Edge::Direct(to));
        }
        self
    }

    pub fn add_conditional_edges(mut self, from: NodeId, routes: &[(Branch, Target)]) -> Self {
        if self.edges.contains_key(&from) {
            self.errors.push(GraphError::ConflictingEdge(from));
        } else {
            self.edges
                .insert(from, Edge::Conditional(routes.iter().copied().collect()));
        }
        self
    }

    /// Validate and freeze the graph.
    ///
    /// Every edge must reference declared nodes, every node needs an outgoing
    /// edge and every node must be reachable from the entry.
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        let declared: BTreeSet<NodeId> = self.nodes.iter().copied().collect();
        if !declared.contains(&entry) {
            return Err(GraphError::UnknownNode(entry));
        }

        for (from, edge) in &self.edges {
            if !declared.contains(from) {
                return Err(GraphError::UnknownNode(*from));
            }
            for target in edge_targets(edge) {
                if let Target::Node(to) = target
                    && !declared.contains(&to)
                {
                    return Err(GraphError::UnknownNode(to));
                }
            }
        }
        for node in &self.nodes {
            if !self.edges.contains_key(node) {
                return Err(GraphError::MissingEdge(*node));
            }
        }

        let mut seen = BTreeSet::from([entry]);
        let mut queue = VecDeque::from([entry]);
        while let Some(node) = queue.pop_front() {
            if let Some(edge) = self.edges.get(&node) {
                for target in edge_targets(edge) {
                    if let Target::Node(next) = target
                        && seen.insert(next)
                    {
                        queue.push_back(next);
                    }
                }
            }
        }
        if let Some(orphan) = self.nodes.iter().find(|n| !seen.contains(n)) {
            return Err(GraphError::Unreachable(*orphan));
        }

        Ok(CompiledGraph {
            entry,
            nodes: self.nodes,
            edges: self.edges,
        })
    }
}

fn edge_targets(edge: &Edge) -> Vec<Target> {
    match edge {
        Edge::Direct(t) => vec![*t],
        Edge::Conditional(routes) => routes.values().copied().collect(),
    }
}

/// A validated, immutable workflow topology.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    entry: NodeId,
    nodes: Vec<NodeId>,
    edges: BTreeMap<NodeId, Edge>,
}

impl CompiledGraph {
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve the successor of `node`. Direct edges ignore `branch`;
    /// conditional edges require one they know.
    pub fn next(&self, node: NodeId, branch: Option<Branch>) -> Result<Target, GraphError> {
        match self.edges.get(&node) {
            None => Err(GraphError::UnknownNode(node)),
            Some(Edge::Direct(t)) => Ok(*t),
            Some(Edge::Conditional(routes)) => {
                let branch = branch.ok_or(GraphError::MissingBranch {
                    node,
                    branch: "none".to_string(),
                })?;
                routes
                    .get(&branch)
                    .copied()
                    .ok_or_else(|| GraphError::MissingBranch {
                        node,
                        branch: branch.to_string(),
                    })
            }
        }
    }
}

/// Declare the proposal workflow: four phase/compress/gate triples, then the
/// critique/revise/finalize loop and the final gate.
pub fn workflow_graph() -> Result<CompiledGraph, GraphError> {
    use NodeId::*;

    let mut builder = GraphBuilder::new();
    for node in NodeId::ALL {
        builder = builder.add_node(node);
    }

    let gate = |next: NodeId, rerun: NodeId| {
        [
            (Branch::Proceed, Target::Node(next)),
            (Branch::Rerun, Target::Node(rerun)),
            (Branch::Fail, Target::End(PhaseId::Error)),
        ]
    };

    builder
        .set_entry(Research)
        .add_edge(Research, Target::Node(CompressResearch))
        .add_edge(CompressResearch, Target::Node(Gate1))
        .add_conditional_edges(Gate1, &gate(Analysis, Research))
        .add_edge(Analysis, Target::Node(CompressAnalysis))
        .add_edge(CompressAnalysis, Target::Node(Gate2))
        .add_conditional_edges(Gate2, &gate(Plan, Analysis))
        .add_edge(Plan, Target::Node(CompressPlan))
        .add_edge(CompressPlan, Target::Node(Gate3))
        .add_conditional_edges(Gate3, &gate(Implement, Plan))
        .add_edge(Implement, Target::Node(CompressImplement))
        .add_edge(CompressImplement, Target::Node(Gate4))
        .add_conditional_edges(Gate4, &gate(Critique, Implement))
        .add_conditional_edges(
            Critique,
            &[
                (Branch::Pass, Target::Node(Finalize)),
                (Branch::Revise, Target::Node(Revise)),
                (Branch::Escalate, Target::Node(Gate5)),
            ],
        )
        .add_edge(Revise, Target::Node(Critique))
        .add_edge(Finalize, Target::Node(Gate5))
        .add_conditional_edges(
            Gate5,
            &[
                (Branch::Complete, Target::End(PhaseId::Completed)),
                (Branch::Rerun, Target::Node(Critique)),
                (Branch::Fail, Target::End(PhaseId::Error)),
            ],
        )
        .compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_graph_compiles_with_sixteen_nodes() {
        let graph = workflow_graph().unwrap();
        assert_eq!(graph.len(), 16);
        assert_eq!(graph.entry(), NodeId::Research);
    }

    #[test]
    fn test_linear_chain() {
        let graph = workflow_graph().unwrap();
        assert_eq!(
            graph.next(NodeId::Research, None).unwrap(),
            Target::Node(NodeId::CompressResearch)
        );
        assert_eq!(
            graph.next(NodeId::Gate2, Some(Branch::Proceed)).unwrap(),
            Target::Node(NodeId::Plan)
        );
        assert_eq!(
            graph.next(NodeId::Gate4, Some(Branch::Rerun)).unwrap(),
            Target::Node(NodeId::Implement)
        );
    }

    #[test]
    fn test_critique_three_way_branch() {
        let graph = workflow_graph().unwrap();
        assert_eq!(
            graph.next(NodeId::Critique, Some(Branch::Pass)).unwrap(),
            Target::Node(NodeId::Finalize)
        );
        assert_eq!(
            graph.next(NodeId::Critique, Some(Branch::Revise)).unwrap(),
            Target::Node(NodeId::Revise)
        );
        assert_eq!(
            graph.next(NodeId::Critique, Some(Branch::Escalate)).unwrap(),
            Target::Node(NodeId::Gate5)
        );
        assert_eq!(
            graph.next(NodeId::Revise, None).unwrap(),
            Target::Node(NodeId::Critique)
        );
    }

    #[test]
    fn test_unknown_branch_is_an_error() {
        let graph = workflow_graph().unwrap();
        let err = graph.next(NodeId::Critique, Some(Branch::Proceed)).unwrap_err();
        assert!(matches!(err, GraphError::MissingBranch { .. }));
        assert!(graph.next(NodeId::Gate1, None).is_err());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let err = GraphBuilder::new()
            .add_node(NodeId::Research)
            .add_node(NodeId::Research)
            .compile()
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode(NodeId::Research));
    }

    #[test]
    fn test_unreachable_node_rejected() {
        let err = GraphBuilder::new()
            .add_node(NodeId::Research)
            .add_node(NodeId::Plan)
            .set_entry(NodeId::Research)
            .add_edge(NodeId::Research, Target::End(PhaseId::Completed))
            .add_edge(NodeId::Plan, Target::End(PhaseId::Completed))
            .compile()
            .unwrap_err();
        assert_eq!(err, GraphError::Unreachable(NodeId::Plan));
    }

    #[test]
    fn test_missing_edge_and_entry() {
        let err = GraphBuilder::new()
            .add_node(NodeId::Research)
            .set_entry(NodeId::Research)
            .compile()
            .unwrap_err();
        assert_eq!(err, GraphError::MissingEdge(NodeId::Research));

        let err = GraphBuilder::new()
            .add_node(NodeId::Research)
            .add_edge(NodeId::Research, Target::End(PhaseId::Completed))
            .compile()
            .unwrap_err();
        assert_eq!(err, GraphError::MissingEntry);
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let err = GraphBuilder::new()
            .add_node(NodeId::Research)
            .set_entry(NodeId::Research)
            .add_edge(NodeId::Research, Target::Node(NodeId::Gate1))
            .compile()
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownNode(NodeId::Gate1));
    }
}
