//! Reasoning steps: the normalized, display-ready form of agent trace fragments.
//!
//! - [`TraceExtractor`] turns one raw fragment into at most one [`ReasoningStep`]
//! - [`SyntheticTraceGenerator`] supplies a fixed sequence when a turn had no trace
//! - [`InputClassifier`] annotates text for display

mod classify;
mod extractor;
mod synthetic;

pub use classify::*;
pub use extractor::*;
pub use synthetic::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent execution phase that produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Preprocessing,
    Orchestration,
    Postprocessing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Preprocessing => write!(f, "preprocessing"),
            Phase::Orchestration => write!(f, "orchestration"),
            Phase::Postprocessing => write!(f, "postprocessing"),
        }
    }
}

/// One normalized reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningStep {
    /// Unique per step; never drives any decision.
    pub trace_id: String,
    pub phase: Phase,
    pub label: String,
    pub narrative: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub decision_points: Vec<DecisionPoint>,
    pub tool_invocations: Vec<ToolInvocation>,
    pub knowledge_queries: Vec<KnowledgeQuery>,
    /// Original fragment payload, kept for drill-down.
    pub raw_detail: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<InputAnalysis>,
}

/// A decision or choice the agent reported making.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPoint {
    pub kind: String,
    pub description: String,
    pub confidence: f64,
}

/// An action-group call made during orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: String,
    pub verb: String,
    pub parameters: std::collections::BTreeMap<String, String>,
}

/// A knowledge-base lookup made during orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeQuery {
    pub query: String,
    pub result_count: u64,
}

/// Generate a step identifier: millisecond timestamp plus a random suffix.
pub fn new_trace_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("trace-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

impl ReasoningStep {
    /// Create a step with empty sub-lists and a fresh trace id.
    pub fn new(
        phase: Phase,
        label: impl Into<String>,
        narrative: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            trace_id: new_trace_id(),
            phase,
            label: label.into(),
            narrative: narrative.into(),
            confidence: confidence.clamp(0.0, 1.0),
            decision_points: Vec::new(),
            tool_invocations: Vec::new(),
            knowledge_queries: Vec::new(),
            raw_detail: serde_json::Value::Null,
            timestamp: Utc::now(),
            annotations: None,
        }
    }

    /// Set decision points
    pub fn with_decision_points(mut self, decision_points: Vec<DecisionPoint>) -> Self {
        self.decision_points = decision_points;
        self
    }

    /// Set tool invocations
    pub fn with_tool_invocations(mut self, tool_invocations: Vec<ToolInvocation>) -> Self {
        self.tool_invocations = tool_invocations;
        self
    }

    /// Set knowledge queries
    pub fn with_knowledge_queries(mut self, knowledge_queries: Vec<KnowledgeQuery>) -> Self {
        self.knowledge_queries = knowledge_queries;
        self
    }

    /// Set the raw detail payload
    pub fn with_raw_detail(mut self, raw_detail: serde_json::Value) -> Self {
        self.raw_detail = raw_detail;
        self
    }

    /// Attach display annotations
    pub fn with_annotations(mut self, annotations: InputAnalysis) -> Self {
        self.annotations = Some(annotations);
        self
    }
}
