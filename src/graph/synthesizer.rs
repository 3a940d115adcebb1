use std::collections::HashSet;

use serde_json::json;
use tracing::info;

use super::{EdgeKind, FlowEdge, FlowGraph, FlowNode, GraphMetadata, NodeKind, NodeStatus};
use crate::config::{GraphConfig, KeywordConfig};
use crate::error::GraphSynthesisError;
use crate::trace::{Phase, ReasoningStep};

#[cfg(test)]
#[path = "synthesizer_tests.rs"]
mod synthesizer_tests;

pub const INPUT_NODE_ID: &str = "user-input";
pub const AGENT_NODE_ID: &str = "bedrock-agent";
pub const DECISION_NODE_ID: &str = "decision-synthesis";
pub const MODEL_NODE_ID: &str = "foundation-model";
pub const OUTPUT_NODE_ID: &str = "final-response";

/// Builds a [`FlowGraph`] from a turn's input, answer and reasoning steps.
///
/// Construction order is fixed: input, agent init, each reasoning step (with
/// its tool nodes, then its knowledge-base nodes), an optional decision
/// synthesis node, the model node and the output node. The "tail" is the node
/// the next main-path node connects from; after a step with side nodes it is
/// the last side node.
#[derive(Debug, Clone, Default)]
pub struct GraphSynthesizer {
    config: GraphConfig,
    keywords: KeywordConfig,
}

/// Mutable state of one build.
#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    edge_ids: HashSet<String>,
    tail: Option<String>,
}

impl GraphBuilder {
    fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: NodeKind,
        label: impl Into<String>,
        service_tag: impl Into<String>,
        metadata: serde_json::Value,
    ) -> String {
        let id = id.into();
        self.nodes.push(FlowNode {
            id: id.clone(),
            kind,
            label: label.into(),
            service_tag: service_tag.into(),
            status: NodeStatus::Completed,
            metadata,
        });
        id
    }

    /// Add an edge unless the same ordered pair is already connected.
    fn connect(&mut self, source: &str, target: &str, kind: EdgeKind) {
        let edge = FlowEdge::new(source, target, kind);
        if self.edge_ids.insert(edge.id.clone()) {
            self.edges.push(edge);
        }
    }

    /// Connect the current tail to `id` and make `id` the new tail.
    fn extend_path(&mut self, id: String) {
        if let Some(tail) = self.tail.take() {
            self.connect(&tail, &id, EdgeKind::Sequence);
        }
        self.tail = Some(id);
    }

    fn finish(self, reasoning_steps: usize) -> FlowGraph {
        let metadata = GraphMetadata {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            reasoning_steps,
        };
        FlowGraph {
            nodes: self.nodes,
            edges: self.edges,
            metadata,
        }
    }
}

impl GraphSynthesizer {
    pub fn new(config: GraphConfig, keywords: KeywordConfig) -> Self {
        Self { config, keywords }
    }

    /// Build and validate the flow graph. Works for an empty step list.
    pub fn synthesize(
        &self,
        input_text: &str,
        final_text: &str,
        steps: &[ReasoningStep],
    ) -> Result<FlowGraph, GraphSynthesisError> {
        let mut builder = GraphBuilder::default();

        let input = builder.add_node(
            INPUT_NODE_ID,
            NodeKind::Input,
            "User Question",
            "user",
            json!({ "text": input_text, "length": input_text.chars().count() }),
        );
        builder.extend_path(input);

        let agent = builder.add_node(
            AGENT_NODE_ID,
            NodeKind::AgentInit,
            "Bedrock Agent",
            "bedrock-agent",
            json!({ "reasoningSteps": steps.len() }),
        );
        builder.extend_path(agent);

        for (index, step) in steps.iter().enumerate() {
            self.add_step(&mut builder, index + 1, step);
        }

        let decisions: Vec<serde_json::Value> = steps
            .iter()
            .enumerate()
            .flat_map(|(index, step)| {
                step.decision_points.iter().map(move |point| {
                    json!({
                        "stepNumber": index + 1,
                        "kind": point.kind,
                        "description": point.description,
                        "confidence": point.confidence,
                    })
                })
            })
            .collect();
        if !decisions.is_empty() {
            let decision = builder.add_node(
                DECISION_NODE_ID,
                NodeKind::DecisionSynthesis,
                "Decision Synthesis",
                "reasoning",
                json!({
                    "totalDecisions": decisions.len(),
                    "summary": format!("{} decision point(s) considered", decisions.len()),
                    "decisions": decisions,
                }),
            );
            builder.extend_path(decision);
        }

        let model = builder.add_node(
            MODEL_NODE_ID,
            NodeKind::Model,
            self.config.model_label.as_str(),
            self.config.model_service_tag.as_str(),
            json!({ "model": self.config.model_label }),
        );
        builder.extend_path(model);

        let output = builder.add_node(
            OUTPUT_NODE_ID,
            NodeKind::Output,
            "AI Response",
            "response",
            json!({ "text": final_text, "length": final_text.chars().count() }),
        );
        builder.extend_path(output);

        let graph = builder.finish(steps.len());
        graph.validate()?;

        info!(
            nodes = graph.metadata.total_nodes,
            edges = graph.metadata.total_edges,
            reasoning_steps = steps.len(),
            "Generated flow graph"
        );

        Ok(graph)
    }

    fn add_step(&self, builder: &mut GraphBuilder, number: usize, step: &ReasoningStep) {
        let step_id = builder.add_node(
            format!("reasoning-{}", number),
            NodeKind::ReasoningStep,
            step.label.as_str(),
            phase_service(step.phase),
            json!({
                "stepNumber": number,
                "phase": step.phase,
                "traceId": step.trace_id,
                "narrative": step.narrative,
                "confidence": step.confidence,
                "decisionPoints": step.decision_points,
            }),
        );
        builder.extend_path(step_id.clone());

        let mut side_nodes = Vec::new();
        for (k, tool) in step.tool_invocations.iter().enumerate() {
            let service = if self.keywords.mentions_web_search(&tool.tool_name) {
                "web-search"
            } else {
                "action-group"
            };
            side_nodes.push(builder.add_node(
                format!("tool-{}-{}", number, k + 1),
                NodeKind::ExternalTool,
                tool.tool_name.as_str(),
                service,
                json!({
                    "toolName": tool.tool_name,
                    "verb": tool.verb,
                    "parameters": tool.parameters,
                    "parentStep": step_id,
                }),
            ));
        }
        for (k, query) in step.knowledge_queries.iter().enumerate() {
            side_nodes.push(builder.add_node(
                format!("knowledge-{}-{}", number, k + 1),
                NodeKind::KnowledgeQuery,
                "Knowledge Base Query",
                "knowledge-base",
                json!({
                    "query": query.query,
                    "resultCount": query.result_count,
                    "parentStep": step_id,
                }),
            ));
        }

        for side in &side_nodes {
            builder.connect(&step_id, side, EdgeKind::Branch);
        }
        if let Some(last) = side_nodes.pop() {
            builder.tail = Some(last);
        }
    }
}

fn phase_service(phase: Phase) -> &'static str {
    match phase {
        Phase::Preprocessing | Phase::Postprocessing => "bedrock-agent",
        Phase::Orchestration => "bedrock-runtime",
    }
}
