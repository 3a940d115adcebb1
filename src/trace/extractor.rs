use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    DecisionPoint, InputAnalysis, InputClassifier, KeywordClassifier, KnowledgeQuery, Phase,
    ReasoningStep, ToolInvocation,
};
use crate::agent::{
    ActionGroupInvocationInput, OrchestrationDetail, PostProcessingDetail, PreProcessingDetail,
    RawDecision, RawTrace, ReasoningHints, TraceDetail,
};
use crate::error::{ExtractionResult, TraceExtractionError};
use crate::messages::{
    ORCHESTRATION_FALLBACK_NARRATIVE, POSTPROCESSING_FALLBACK_NARRATIVE,
    PREPROCESSING_FALLBACK_NARRATIVE,
};

/// Confidence when both reasoning text and supporting detail are present.
const CONFIDENCE_SUPPORTED: f64 = 0.9;
/// Confidence when only reasoning text is present.
const CONFIDENCE_REASONED: f64 = 0.7;
/// Confidence with no reasoning text.
const CONFIDENCE_BASELINE: f64 = 0.6;
/// Confidence for a reported decision that carries none.
const DECISION_DEFAULT_CONFIDENCE: f64 = 0.5;

/// Converts raw trace fragments into [`ReasoningStep`]s.
///
/// Pure apart from the generated trace id and timestamp. Fragments with no
/// recognized phase record yield `None`; problems with optional fields fall back
/// to that field's default.
#[derive(Clone)]
pub struct TraceExtractor {
    classifier: Arc<dyn InputClassifier>,
}

impl Default for TraceExtractor {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier::default()))
    }
}

impl TraceExtractor {
    /// Create an extractor using `classifier` for step annotations.
    pub fn new(classifier: Arc<dyn InputClassifier>) -> Self {
        Self { classifier }
    }

    /// Extract a reasoning step from one fragment.
    pub fn extract(&self, raw: &RawTrace) -> Option<ReasoningStep> {
        let step = match raw.detail()? {
            TraceDetail::PreProcessing(detail) => self.pre_processing(detail),
            TraceDetail::Orchestration(detail) => self.orchestration(detail),
            TraceDetail::PostProcessing(detail) => self.post_processing(detail),
        };

        debug!(
            trace_id = %step.trace_id,
            phase = %step.phase,
            label = %step.label,
            "Extracted reasoning step"
        );
        Some(step)
    }

    fn pre_processing(&self, detail: &PreProcessingDetail) -> ReasoningStep {
        let parsed = detail
            .model_invocation_output
            .as_ref()
            .and_then(|o| o.parsed_response.as_ref());
        let rationale = parsed.and_then(|p| non_empty(p.rationale.as_deref()));
        let model_input = detail
            .model_invocation_input
            .as_ref()
            .and_then(|i| non_empty(i.text.as_deref()));

        let reasoning = non_empty(detail.hints.thought.as_deref()).or(rationale);
        let supported = model_input.is_some() || parsed.and_then(|p| p.is_valid).is_some();

        let label = match parsed.and_then(|p| p.is_valid) {
            Some(false) => "Input Validation Failed",
            _ => "Input Processing",
        };
        let narrative = reasoning.unwrap_or(PREPROCESSING_FALLBACK_NARRATIVE);

        let step = ReasoningStep::new(
            Phase::Preprocessing,
            label,
            narrative,
            confidence(&detail.hints, reasoning.is_some(), supported),
        )
        .with_decision_points(decision_points(&detail.hints))
        .with_raw_detail(raw_detail(detail));

        match self.annotate(model_input.unwrap_or(narrative)) {
            Some(analysis) => step.with_annotations(analysis),
            None => step,
        }
    }

    fn orchestration(&self, detail: &OrchestrationDetail) -> ReasoningStep {
        let rationale = detail
            .rationale
            .as_ref()
            .and_then(|r| non_empty(r.text.as_deref()));
        let observation = detail.observation.as_ref().and_then(|o| o.text());
        let reasoning = non_empty(detail.hints.thought.as_deref()).or(rationale);

        let tools: Vec<ToolInvocation> = detail
            .invocation_input
            .as_ref()
            .and_then(|i| i.action_group_invocation_input.as_ref())
            .map(|input| vec![tool_invocation(input)])
            .unwrap_or_default();
        let queries = knowledge_queries(detail);

        let supported = detail.observation.is_some()
            || detail.invocation_input.is_some()
            || detail.model_invocation_input.is_some();

        let label = if !tools.is_empty() {
            let names: Vec<&str> = tools.iter().map(|t| t.tool_name.as_str()).collect();
            format!("Tool Invocation: {}", names.join(", "))
        } else if !queries.is_empty() {
            "Knowledge Base Lookup".to_string()
        } else if detail
            .observation
            .as_ref()
            .is_some_and(|o| o.final_response.is_some())
        {
            "Final Answer Drafted".to_string()
        } else if detail.observation.is_some() {
            "Observation".to_string()
        } else if detail.model_invocation_input.is_some() {
            "Model Invocation".to_string()
        } else if reasoning.is_some() {
            "Agent Reasoning".to_string()
        } else {
            "Agent Orchestration".to_string()
        };

        let narrative = reasoning
            .or(observation)
            .unwrap_or(ORCHESTRATION_FALLBACK_NARRATIVE);

        ReasoningStep::new(
            Phase::Orchestration,
            label,
            narrative,
            confidence(&detail.hints, reasoning.is_some(), supported),
        )
        .with_decision_points(decision_points(&detail.hints))
        .with_tool_invocations(tools)
        .with_knowledge_queries(queries)
        .with_raw_detail(raw_detail(detail))
    }

    fn post_processing(&self, detail: &PostProcessingDetail) -> ReasoningStep {
        let parsed_text = detail
            .model_invocation_output
            .as_ref()
            .and_then(|o| o.parsed_response.as_ref())
            .and_then(|p| non_empty(p.text.as_deref()));
        let reasoning = non_empty(detail.hints.thought.as_deref());
        let supported = parsed_text.is_some() || detail.model_invocation_input.is_some();

        let narrative = reasoning
            .or(parsed_text)
            .unwrap_or(POSTPROCESSING_FALLBACK_NARRATIVE);

        ReasoningStep::new(
            Phase::Postprocessing,
            "Response Generation",
            narrative,
            confidence(&detail.hints, reasoning.is_some(), supported),
        )
        .with_decision_points(decision_points(&detail.hints))
        .with_raw_detail(raw_detail(detail))
    }

    /// Run the classifier, containing any panic from a custom strategy.
    fn annotate(&self, text: &str) -> Option<InputAnalysis> {
        let classifier = &self.classifier;
        match catch_unwind(AssertUnwindSafe(|| classifier.classify(text))) {
            Ok(analysis) => Some(analysis),
            Err(_) => {
                warn!("Input classifier panicked; step left unannotated");
                None
            }
        }
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Replace a failed optional-field derivation with its default.
fn recover<T>(result: ExtractionResult<T>, default: T) -> T {
    result.unwrap_or_else(|e| {
        debug!(error = %e, "Trace field fell back to default");
        default
    })
}

fn unit_interval(field: &'static str, value: f64) -> ExtractionResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(TraceExtractionError::InvalidField {
            field,
            reason: format!("{} is outside [0, 1]", value),
        })
    }
}

fn explicit_confidence(hints: &ReasoningHints) -> ExtractionResult<f64> {
    let value = hints
        .confidence
        .or(hints.score)
        .ok_or(TraceExtractionError::MissingField {
            field: "confidence",
        })?;
    unit_interval("confidence", value)
}

fn confidence(hints: &ReasoningHints, has_reasoning: bool, has_support: bool) -> f64 {
    let estimated = match (has_reasoning, has_support) {
        (true, true) => CONFIDENCE_SUPPORTED,
        (true, false) => CONFIDENCE_REASONED,
        _ => CONFIDENCE_BASELINE,
    };
    recover(explicit_confidence(hints), estimated)
}

fn decision_point(default_kind: &str, raw: &RawDecision) -> ExtractionResult<DecisionPoint> {
    let description = non_empty(raw.description.as_deref()).ok_or(
        TraceExtractionError::MissingField {
            field: "description",
        },
    )?;
    let confidence = match raw.confidence {
        Some(value) => recover(
            unit_interval("decision confidence", value),
            DECISION_DEFAULT_CONFIDENCE,
        ),
        None => DECISION_DEFAULT_CONFIDENCE,
    };

    Ok(DecisionPoint {
        kind: non_empty(raw.kind.as_deref())
            .unwrap_or(default_kind)
            .to_string(),
        description: description.to_string(),
        confidence,
    })
}

fn decision_points(hints: &ReasoningHints) -> Vec<DecisionPoint> {
    let decisions = hints.decisions.iter().map(|d| ("decision", d));
    let choices = hints.choices.iter().map(|c| ("choice", c));

    decisions
        .chain(choices)
        .filter_map(|(kind, raw)| match decision_point(kind, raw) {
            Ok(point) => Some(point),
            Err(e) => {
                debug!(error = %e, "Skipping malformed decision point");
                None
            }
        })
        .collect()
}

fn tool_name(input: &ActionGroupInvocationInput) -> ExtractionResult<String> {
    [&input.action_group_name, &input.function, &input.api_path]
        .into_iter()
        .find_map(|candidate| non_empty(candidate.as_deref()))
        .map(str::to_string)
        .ok_or(TraceExtractionError::MissingField { field: "tool name" })
}

fn tool_invocation(input: &ActionGroupInvocationInput) -> ToolInvocation {
    let verb = non_empty(input.verb.as_deref())
        .map(str::to_lowercase)
        .unwrap_or_else(|| {
            if input.function.is_some() {
                "function".to_string()
            } else {
                "invoke".to_string()
            }
        });

    let parameters: BTreeMap<String, String> = input
        .parameters
        .iter()
        .filter_map(|p| {
            let name = non_empty(p.name.as_deref())?;
            Some((name.to_string(), p.value.clone().unwrap_or_default()))
        })
        .collect();

    ToolInvocation {
        tool_name: recover(tool_name(input), "action-group".to_string()),
        verb,
        parameters,
    }
}

fn knowledge_queries(detail: &OrchestrationDetail) -> Vec<KnowledgeQuery> {
    let lookup = detail
        .invocation_input
        .as_ref()
        .and_then(|i| i.knowledge_base_lookup_input.as_ref());
    let retrieved = detail
        .observation
        .as_ref()
        .and_then(|o| o.knowledge_base_lookup_output.as_ref())
        .map(|output| output.retrieved_references.len() as u64);

    match (lookup, retrieved) {
        (None, None) => Vec::new(),
        (Some(lookup), retrieved) => vec![KnowledgeQuery {
            query: non_empty(lookup.text.as_deref())
                .unwrap_or("knowledge base lookup")
                .to_string(),
            result_count: lookup.result_count.or(retrieved).unwrap_or(0),
        }],
        (None, Some(count)) => vec![KnowledgeQuery {
            query: "retrieved references".to_string(),
            result_count: count,
        }],
    }
}

fn raw_detail<T: serde::Serialize>(detail: &T) -> serde_json::Value {
    recover(
        serde_json::to_value(detail).map_err(|e| TraceExtractionError::InvalidField {
            field: "raw detail",
            reason: e.to_string(),
        }),
        serde_json::Value::Null,
    )
}
