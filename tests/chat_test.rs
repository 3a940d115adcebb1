//! End-to-end chat pipeline tests against a scripted agent
//!
//! These tests run ChatService over a fake AgentClient and check the turn
//! that comes out: steps, flow graph, guarded answer and error kinds.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use common::{create_test_config, text, trace, Script, ScriptedAgent, AGENT_ID};
use transparai::chat::{ChatEvent, ChatService};
use transparai::config::Environment;
use transparai::error::{AgentError, AppError};
use transparai::graph::NodeKind;
use transparai::messages::{CONNECTION_TEST_PROMPT, GREETING_RESPONSE};
use transparai::trace::Phase;

const ANSWER: &str = "A neural network is a stack of layers that learn weighted transformations.";

fn service(agent: Arc<ScriptedAgent>) -> ChatService {
    ChatService::new(agent, &create_test_config(Environment::Development))
}

async fn collect(mut events: UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }
    collected
}

fn event_types(events: &[ChatEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            ChatEvent::Start { .. } => "start",
            ChatEvent::Reasoning { .. } => "reasoning",
            ChatEvent::Response { .. } => "response",
            ChatEvent::End => "end",
            ChatEvent::Error { .. } => "error",
        })
        .collect()
}

// ============================================================================
// JSON turns
// ============================================================================

#[tokio::test]
async fn test_no_trace_yields_synthetic_steps_and_bracketing_nodes() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![text("A neural network "), text(&ANSWER[17..])]));
    let chat = service(agent);

    let turn = chat
        .chat("What is a neural network?", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(turn.response, ANSWER);
    assert_eq!(turn.reasoning.step_count, 5);
    assert!(turn.metadata.synthetic_trace);

    let graph = &turn.reasoning.flow_data;
    for kind in [NodeKind::Input, NodeKind::AgentInit, NodeKind::Model, NodeKind::Output] {
        assert_eq!(graph.nodes_of_kind(kind).len(), 1, "{:?}", kind);
    }
    assert_eq!(graph.nodes_of_kind(NodeKind::ReasoningStep).len(), 5);
}

#[tokio::test]
async fn test_greeting_non_answer_is_replaced() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![text(
        "This greeting does not require a specific action.",
    )]));
    let chat = service(agent);

    let turn = chat.chat("hi", None, &CancellationToken::new()).await.unwrap();
    assert_eq!(turn.response, GREETING_RESPONSE);
    assert_eq!(
        turn.metadata.response_length,
        GREETING_RESPONSE.chars().count()
    );
}

#[tokio::test]
async fn test_knowledge_lookup_node_sits_on_main_path() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![
        trace(json!({
            "orchestrationTrace": {
                "invocationInput": {
                    "knowledgeBaseLookupInput": {
                        "text": "neural network basics",
                        "knowledgeBaseId": "KB1",
                        "resultCount": 15
                    }
                }
            }
        })),
        text(ANSWER),
    ]));
    let chat = service(agent);

    let turn = chat
        .chat("What is a neural network?", None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!turn.metadata.synthetic_trace);
    assert_eq!(turn.reasoning.step_count, 1);
    assert_eq!(turn.reasoning.steps[0].label, "Knowledge Base Lookup");

    let graph = &turn.reasoning.flow_data;
    let knowledge = graph.nodes_of_kind(NodeKind::KnowledgeQuery);
    assert_eq!(knowledge.len(), 1);
    assert_eq!(knowledge[0].metadata["resultCount"], 15);
    assert_eq!(graph.successors("reasoning-1"), vec![knowledge[0].id.as_str()]);
    assert_eq!(graph.successors(&knowledge[0].id), vec!["foundation-model"]);
}

#[tokio::test]
async fn test_real_steps_keep_arrival_order() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![
        trace(json!({
            "preProcessingTrace": {
                "modelInvocationOutput": {
                    "parsedResponse": { "rationale": "User asks about neural networks", "isValid": true }
                }
            }
        })),
        text(ANSWER),
        trace(json!({
            "orchestrationTrace": {
                "invocationInput": {
                    "actionGroupInvocationInput": {
                        "actionGroupName": "WebSearch",
                        "verb": "GET",
                        "parameters": [{ "name": "query", "value": "neural networks" }]
                    }
                }
            }
        })),
        trace(json!({ "guardrailTrace": {} })),
        trace(json!({
            "postProcessingTrace": {
                "modelInvocationOutput": { "parsedResponse": { "text": "Formatted answer" } }
            }
        })),
    ]));
    let chat = service(agent);

    let turn = chat
        .chat("What is a neural network?", Some("session-9".to_string()), &CancellationToken::new())
        .await
        .unwrap();

    let phases: Vec<Phase> = turn.reasoning.steps.iter().map(|s| s.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::Preprocessing, Phase::Orchestration, Phase::Postprocessing]
    );
    assert_eq!(turn.session_id, "session-9");
    assert_eq!(turn.metadata.agent_id, AGENT_ID);

    let tool = turn.reasoning.flow_data.node("tool-2-1").unwrap();
    assert_eq!(tool.service_tag, "web-search");
    assert_eq!(tool.metadata["parameters"]["query"], "neural networks");
}

#[tokio::test]
async fn test_final_text_is_trimmed() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![text("\n  "), text(ANSWER), text("  \n")]));
    let turn = service(agent)
        .chat("Explain neural networks", None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(turn.response, ANSWER);
}

#[tokio::test]
async fn test_empty_message_is_rejected_without_calling_agent() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![text(ANSWER)]));
    let chat = service(agent.clone());

    let err = chat.chat("   ", None, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest { .. }));
    assert_eq!(err.kind(), "bad_request");
    assert_eq!(agent.calls(), 0);
}

#[tokio::test]
async fn test_stream_failure_is_all_or_nothing() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![
        text("Half of an answer"),
        Err(AgentError::Invocation {
            message: "ThrottlingException: rate exceeded".to_string(),
        }),
    ]));

    let err = service(agent)
        .chat("What is a neural network?", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "agent_invocation_error");
    assert!(err.to_string().contains("rate exceeded"));
}

#[tokio::test]
async fn test_upstream_timeout_has_distinct_kind() {
    let agent = ScriptedAgent::new(Script::Fail(AgentError::Timeout {
        message: "operation timeout (all attempts including retries) occurred".to_string(),
    }));

    let err = service(agent)
        .chat("What is a neural network?", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "agent_timeout");
}

#[tokio::test]
async fn test_cancellation_stops_the_turn() {
    let agent = ScriptedAgent::new(Script::Hang(vec![text("partial")]));
    let chat = service(agent);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        chat.chat("What is a neural network?", None, &cancel),
    )
    .await
    .expect("cancellation should end the turn")
    .unwrap_err();
    assert_eq!(err.kind(), "cancelled");
}

#[tokio::test]
async fn test_analysis_metadata_classifies_input() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![text(ANSWER)]));
    let turn = service(agent)
        .chat("What is a neural network?", None, &CancellationToken::new())
        .await
        .unwrap();

    let metadata = serde_json::to_value(&turn.metadata).unwrap();
    assert_eq!(metadata["analysis"]["topic"], "neural-networks");
    assert_eq!(metadata["inputLength"], 25);
    assert_eq!(metadata["syntheticTrace"], true);
}

// ============================================================================
// Streaming turns
// ============================================================================

#[tokio::test]
async fn test_stream_events_follow_turn_order() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![
        trace(json!({ "orchestrationTrace": { "rationale": { "text": "Define it first" } } })),
        text(ANSWER),
        trace(json!({ "orchestrationTrace": { "rationale": { "text": "Then an example" } } })),
    ]));
    let chat = Arc::new(service(agent));

    let events = chat
        .chat_stream("What is a neural network?".to_string(), None, CancellationToken::new())
        .unwrap();
    let events = collect(events).await;

    assert_eq!(
        event_types(&events),
        vec!["start", "reasoning", "reasoning", "response", "end"]
    );
    match &events[2] {
        ChatEvent::Reasoning { step, data } => {
            assert_eq!(*step, 2);
            assert_eq!(data.narrative, "Then an example");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match &events[3] {
        ChatEvent::Response {
            data, step_count, ..
        } => {
            assert_eq!(data, ANSWER);
            assert_eq!(*step_count, 2);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_sends_synthetic_steps_after_upstream_ends() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![text(ANSWER)]));
    let chat = Arc::new(service(agent));

    let events = collect(
        chat.chat_stream("Explain neural networks".to_string(), None, CancellationToken::new())
            .unwrap(),
    )
    .await;

    let types = event_types(&events);
    assert_eq!(types.first(), Some(&"start"));
    assert_eq!(types.iter().filter(|t| **t == "reasoning").count(), 5);
    assert_eq!(&types[types.len() - 2..], &["response", "end"]);
}

#[tokio::test]
async fn test_stream_error_event_replaces_response() {
    let agent = ScriptedAgent::new(Script::Fail(AgentError::Invocation {
        message: "AccessDeniedException".to_string(),
    }));
    let chat = Arc::new(service(agent));

    let events = collect(
        chat.chat_stream("Explain neural networks".to_string(), None, CancellationToken::new())
            .unwrap(),
    )
    .await;

    assert_eq!(event_types(&events), vec!["start", "error"]);
    match &events[1] {
        ChatEvent::Error {
            error_kind,
            details,
            ..
        } => {
            assert_eq!(*error_kind, "agent_invocation_error");
            assert!(details.as_deref().unwrap().contains("AccessDeniedException"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_production_stream_error_hides_details() {
    let agent = ScriptedAgent::new(Script::Fail(AgentError::Invocation {
        message: "AccessDeniedException".to_string(),
    }));
    let chat = Arc::new(ChatService::new(
        agent,
        &create_test_config(Environment::Production),
    ));

    let events = collect(
        chat.chat_stream("Explain neural networks".to_string(), None, CancellationToken::new())
            .unwrap(),
    )
    .await;

    match &events[1] {
        ChatEvent::Error { error, details, .. } => {
            assert!(details.is_none());
            assert!(!error.contains("AccessDenied"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_dropping_stream_cancels_upstream_call() {
    let agent = ScriptedAgent::new(Script::Hang(vec![]));
    let chat = Arc::new(service(agent));
    let cancel = CancellationToken::new();

    let mut events = chat
        .chat_stream("Explain neural networks".to_string(), None, cancel.clone())
        .unwrap();
    assert!(matches!(events.recv().await, Some(ChatEvent::Start { .. })));
    drop(events);

    tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
        .await
        .expect("disconnect should cancel the agent call");
}

#[tokio::test]
async fn test_stream_rejects_empty_message_up_front() {
    let agent = ScriptedAgent::new(Script::Chunks(vec![]));
    let chat = Arc::new(service(agent));

    let err = chat
        .chat_stream(String::new(), None, CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), "bad_request");
}

// ============================================================================
// Connection self-test
// ============================================================================

#[tokio::test]
async fn test_connection_test_reports_preview() {
    let long_answer = "x".repeat(250);
    let agent = ScriptedAgent::new(Script::Chunks(vec![text(&long_answer)]));
    let chat = service(agent.clone());

    let result = chat.test_connection().await;
    assert!(result.success);
    assert_eq!(result.agent_id, AGENT_ID);
    assert_eq!(result.response.unwrap(), format!("{}...", "x".repeat(100)));
    assert_eq!(result.reasoning_steps, Some(5));
    assert_eq!(agent.requests.lock().unwrap()[0].input_text, CONNECTION_TEST_PROMPT);
}

#[tokio::test]
async fn test_connection_test_reports_failure() {
    let agent = ScriptedAgent::new(Script::Fail(AgentError::Invocation {
        message: "ResourceNotFoundException".to_string(),
    }));

    let result = service(agent).test_connection().await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("ResourceNotFoundException"));
}
