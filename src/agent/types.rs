//! Raw trace fragment records.
//!
//! These mirror the agent's camelCase wire shape so fragments can be built from
//! JSON as well as from SDK events. Every field is optional; the extractor
//! decides what a fragment means.

use serde::{Deserialize, Serialize};

/// One trace fragment from the agent event stream.
///
/// At most one of the three phase records is expected to be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_processing_trace: Option<PreProcessingDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_trace: Option<OrchestrationDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing_trace: Option<PostProcessingDetail>,
}

/// Borrowed view of the phase record that produced a fragment.
#[derive(Debug, Clone, Copy)]
pub enum TraceDetail<'a> {
    PreProcessing(&'a PreProcessingDetail),
    Orchestration(&'a OrchestrationDetail),
    PostProcessing(&'a PostProcessingDetail),
}

impl RawTrace {
    /// Wrap a pre-processing record.
    pub fn pre_processing(detail: PreProcessingDetail) -> Self {
        Self {
            pre_processing_trace: Some(detail),
            ..Default::default()
        }
    }

    /// Wrap an orchestration record.
    pub fn orchestration(detail: OrchestrationDetail) -> Self {
        Self {
            orchestration_trace: Some(detail),
            ..Default::default()
        }
    }

    /// Wrap a post-processing record.
    pub fn post_processing(detail: PostProcessingDetail) -> Self {
        Self {
            post_processing_trace: Some(detail),
            ..Default::default()
        }
    }

    /// The phase record carried by this fragment, checked in phase order.
    pub fn detail(&self) -> Option<TraceDetail<'_>> {
        if let Some(detail) = &self.pre_processing_trace {
            return Some(TraceDetail::PreProcessing(detail));
        }
        if let Some(detail) = &self.orchestration_trace {
            return Some(TraceDetail::Orchestration(detail));
        }
        self.post_processing_trace
            .as_ref()
            .map(TraceDetail::PostProcessing)
    }
}

/// Explicit reasoning fields some agents attach to any phase record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<RawDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<RawDecision>,
}

/// A decision or choice as reported by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDecision {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreProcessingDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_invocation_input: Option<ModelInvocationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_invocation_output: Option<PreProcessingOutput>,
    #[serde(flatten)]
    pub hints: ReasoningHints,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreProcessingOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_response: Option<PreProcessingParsedResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreProcessingParsedResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInvocationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<TextPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_input: Option<InvocationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<Observation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_invocation_input: Option<ModelInvocationInput>,
    #[serde(flatten)]
    pub hints: ReasoningHints,
}

/// `{ "text": ... }` wrapper used by several trace records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_group_invocation_input: Option<ActionGroupInvocationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_lookup_input: Option<KnowledgeBaseLookupInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupInvocationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RawParameter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseLookupInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    /// Explicit result count, when the agent reports one alongside the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_response: Option<TextPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_group_invocation_output: Option<TextPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_lookup_output: Option<KnowledgeBaseLookupOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt_response: Option<TextPayload>,
}

impl Observation {
    /// First populated observation text, in reporting priority order.
    pub fn text(&self) -> Option<&str> {
        [
            &self.final_response,
            &self.action_group_invocation_output,
            &self.reprompt_response,
        ]
        .into_iter()
        .flatten()
        .find_map(|payload| {
            payload
                .text
                .as_deref()
                .filter(|text| !text.trim().is_empty())
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseLookupOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_references: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessingDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_invocation_input: Option<ModelInvocationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_invocation_output: Option<PostProcessingOutput>,
    #[serde(flatten)]
    pub hints: ReasoningHints,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessingOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_response: Option<TextPayload>,
}
