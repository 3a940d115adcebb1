//! Flow graph handed to the visualization layer.
//!
//! A graph is one directed path from the single `input` node to the single
//! `output` node, with tool and knowledge-base side nodes branching off
//! reasoning steps. [`GraphSynthesizer`] builds it; [`FlowGraph::validate`]
//! checks the shape.

mod synthesizer;

pub use synthesizer::*;

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::GraphSynthesisError;

/// Node and edge lists plus summary counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub metadata: GraphMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub service_tag: String,
    pub status: NodeStatus,
    pub metadata: serde_json::Value,
}

/// Kind of node in the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Input,
    AgentInit,
    ReasoningStep,
    ExternalTool,
    KnowledgeQuery,
    DecisionSynthesis,
    Model,
    Output,
}

/// Node status. Every node of a finished turn is completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    /// `"<source>-<target>"`.
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// Kind of edge in the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Main path, tail to next node.
    Sequence,
    /// Reasoning step to one of its tool or knowledge-base nodes.
    Branch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub reasoning_steps: usize,
}

impl FlowEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}-{}", source, target),
            source,
            target,
            kind,
        }
    }
}

impl FlowGraph {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes of the given kind, in emission order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&FlowNode> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    /// Targets of edges leaving `id`, in emission order.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target.as_str())
            .collect()
    }

    /// Check the structural invariants: unique ids, exactly one input and one
    /// output, edges between known nodes, no cycles, and every node reachable
    /// from the input.
    pub fn validate(&self) -> Result<(), GraphSynthesisError> {
        let violation = |message: String| GraphSynthesisError::InvariantViolation { message };

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(violation(format!("duplicate node id '{}'", node.id)));
            }
        }

        let inputs = self.nodes_of_kind(NodeKind::Input);
        let outputs = self.nodes_of_kind(NodeKind::Output);
        if inputs.len() != 1 || outputs.len() != 1 {
            return Err(violation(format!(
                "expected one input and one output node, found {} and {}",
                inputs.len(),
                outputs.len()
            )));
        }

        let mut edge_ids = HashSet::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(violation(format!("duplicate edge '{}'", edge.id)));
            }
            if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
                return Err(violation(format!("edge '{}' references an unknown node", edge.id)));
            }
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            *in_degree.entry(edge.target.as_str()).or_default() += 1;
        }

        // Kahn's algorithm: every node is dequeued exactly when the graph is acyclic.
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut sorted = 0;
        while let Some(id) = queue.pop_front() {
            sorted += 1;
            for next in adjacency.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*next);
                    }
                }
            }
        }
        if sorted != self.nodes.len() {
            return Err(violation("graph contains a cycle".to_string()));
        }

        let mut reached = HashSet::from([inputs[0].id.as_str()]);
        let mut frontier = vec![inputs[0].id.as_str()];
        while let Some(id) = frontier.pop() {
            for next in adjacency.get(id).into_iter().flatten() {
                if reached.insert(*next) {
                    frontier.push(*next);
                }
            }
        }
        if reached.len() != self.nodes.len() {
            let unreachable: Vec<&str> = self
                .nodes
                .iter()
                .map(|n| n.id.as_str())
                .filter(|id| !reached.contains(id))
                .collect();
            return Err(violation(format!(
                "nodes not reachable from input: {}",
                unreachable.join(", ")
            )));
        }

        Ok(())
    }
}
