//! Chat turns: one agent call, its reasoning steps, the flow graph and the
//! final answer.
//!
//! [`ChatService::chat`] returns the whole turn at once.
//! [`ChatService::chat_stream`] emits the same turn as [`ChatEvent`]s, sending
//! each reasoning step as soon as it is extracted.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentClient, AgentInvoker, AgentTurn};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::graph::{FlowGraph, GraphSynthesizer};
use crate::messages::CONNECTION_TEST_PROMPT;
use crate::response::ResponseAssembler;
use crate::trace::{
    InputAnalysis, InputClassifier, KeywordClassifier, ReasoningStep, SyntheticTraceGenerator,
    TraceExtractor,
};

/// Characters of the answer echoed back by the connection self-test.
const CONNECTION_TEST_PREVIEW_CHARS: usize = 100;

/// One completed chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub reasoning: Reasoning,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reasoning {
    pub steps: Vec<ReasoningStep>,
    pub flow_data: FlowGraph,
    pub step_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    /// Characters in the user's message.
    pub input_length: usize,
    /// Characters in the returned answer.
    pub response_length: usize,
    /// True when the steps were generated because the agent reported none.
    pub synthetic_trace: bool,
    pub analysis: InputAnalysis,
}

/// Streaming form of a chat turn.
///
/// A stream is `start`, zero or more `reasoning`, then either `response`
/// followed by `end`, or a single `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ChatEvent {
    Start {
        message: String,
    },
    Reasoning {
        /// 1-based position of the step in the turn.
        step: usize,
        data: ReasoningStep,
    },
    Response {
        data: String,
        flow_data: FlowGraph,
        session_id: String,
        step_count: usize,
    },
    End,
    Error {
        error: String,
        error_kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

/// Result of the connection self-test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTest {
    pub success: bool,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs chat turns against one agent.
pub struct ChatService {
    invoker: AgentInvoker,
    classifier: Arc<dyn InputClassifier>,
    synthetic: SyntheticTraceGenerator,
    synthesizer: GraphSynthesizer,
    assembler: ResponseAssembler,
    expose_error_details: bool,
}

impl ChatService {
    /// Build the pipeline around `client`, with the keyword classifier
    /// configured from `config`.
    pub fn new(client: Arc<dyn AgentClient>, config: &Config) -> Self {
        let classifier: Arc<dyn InputClassifier> =
            Arc::new(KeywordClassifier::new(&config.keywords));
        Self::with_classifier(client, config, classifier)
    }

    /// Build the pipeline with a custom input classifier.
    pub fn with_classifier(
        client: Arc<dyn AgentClient>,
        config: &Config,
        classifier: Arc<dyn InputClassifier>,
    ) -> Self {
        Self {
            invoker: AgentInvoker::new(client, TraceExtractor::new(classifier.clone())),
            classifier,
            synthetic: SyntheticTraceGenerator::new(),
            synthesizer: GraphSynthesizer::new(config.graph.clone(), config.keywords.clone()),
            assembler: ResponseAssembler::new(),
            expose_error_details: config.server.exposes_error_details(),
        }
    }

    pub fn agent_id(&self) -> &str {
        self.invoker.agent_id()
    }

    /// Run one turn and return it whole.
    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<String>,
        cancel: &CancellationToken,
    ) -> AppResult<ChatResponse> {
        validate_message(message)?;
        let start = Instant::now();

        let turn = self.invoker.invoke(message, session_id, cancel).await?;
        let response = self.complete_turn(message, turn)?;

        info!(
            session_id = %response.session_id,
            steps = response.reasoning.step_count,
            synthetic = response.metadata.synthetic_trace,
            latency_ms = start.elapsed().as_millis(),
            "Chat turn completed"
        );
        Ok(response)
    }

    /// Run one turn in the background and return its event stream.
    ///
    /// Validation errors are returned directly so the caller can reject the
    /// request before streaming starts. Dropping the receiver cancels the
    /// upstream call.
    pub fn chat_stream(
        self: Arc<Self>,
        message: String,
        session_id: Option<String>,
        cancel: CancellationToken,
    ) -> AppResult<UnboundedReceiver<ChatEvent>> {
        validate_message(&message)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ChatEvent::Start {
            message: "Processing your request...".to_string(),
        });

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = tx.closed() => {
                    debug!("Stream client disconnected, cancelling agent call");
                    cancel.cancel();
                }
                _ = self.stream_turn(&message, session_id, &cancel, &tx) => {}
            }
        });

        Ok(rx)
    }

    async fn stream_turn(
        &self,
        message: &str,
        session_id: Option<String>,
        cancel: &CancellationToken,
        tx: &UnboundedSender<ChatEvent>,
    ) {
        let mut sent = 0usize;
        let invoked = self
            .invoker
            .invoke_with(message, session_id, cancel, |step| {
                sent += 1;
                let _ = tx.send(ChatEvent::Reasoning {
                    step: sent,
                    data: step.clone(),
                });
            })
            .await;

        let completed = invoked
            .map_err(AppError::from)
            .and_then(|turn| self.complete_turn(message, turn));

        match completed {
            Ok(response) => {
                // Synthetic steps only exist once the stream has ended.
                if response.metadata.synthetic_trace {
                    for (index, step) in response.reasoning.steps.iter().enumerate() {
                        let _ = tx.send(ChatEvent::Reasoning {
                            step: index + 1,
                            data: step.clone(),
                        });
                    }
                }
                info!(
                    session_id = %response.session_id,
                    steps = response.reasoning.step_count,
                    "Streamed chat turn completed"
                );
                let _ = tx.send(ChatEvent::Response {
                    data: response.response,
                    flow_data: response.reasoning.flow_data,
                    session_id: response.session_id,
                    step_count: response.reasoning.step_count,
                });
                let _ = tx.send(ChatEvent::End);
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Streamed chat turn failed");
                let _ = tx.send(self.error_event(&e));
            }
        }
    }

    /// Call the agent with a fixed prompt and report whether it answered.
    pub async fn test_connection(&self) -> ConnectionTest {
        match self
            .chat(CONNECTION_TEST_PROMPT, None, &CancellationToken::new())
            .await
        {
            Ok(response) => {
                let preview: String = response
                    .response
                    .chars()
                    .take(CONNECTION_TEST_PREVIEW_CHARS)
                    .collect();
                ConnectionTest {
                    success: true,
                    agent_id: self.agent_id().to_string(),
                    response: Some(format!("{}...", preview)),
                    reasoning_steps: Some(response.reasoning.step_count),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Agent connection test failed");
                ConnectionTest {
                    success: false,
                    agent_id: self.agent_id().to_string(),
                    response: None,
                    reasoning_steps: None,
                    error: Some(self.describe_error(&e)),
                }
            }
        }
    }

    /// Error event for the stream, with details only where configured.
    pub fn error_event(&self, err: &AppError) -> ChatEvent {
        ChatEvent::Error {
            error: err.public_message(),
            error_kind: err.kind(),
            details: self.expose_error_details.then(|| err.to_string()),
        }
    }

    fn describe_error(&self, err: &AppError) -> String {
        if self.expose_error_details {
            err.to_string()
        } else {
            err.public_message()
        }
    }

    /// Fill in synthetic steps if needed, apply the answer guardrail and build
    /// the flow graph.
    fn complete_turn(&self, message: &str, turn: AgentTurn) -> AppResult<ChatResponse> {
        let AgentTurn {
            final_text,
            steps,
            session_id,
        } = turn;

        let final_text = final_text.trim();
        let synthetic_trace = steps.is_empty();
        let steps = if synthetic_trace {
            self.synthetic.synthesize(final_text)
        } else {
            steps
        };

        let response = self.assembler.assemble(final_text, message);
        let flow_data = self.synthesizer.synthesize(message, &response, &steps)?;

        Ok(ChatResponse {
            metadata: ChatMetadata {
                agent_id: self.agent_id().to_string(),
                timestamp: Utc::now(),
                input_length: message.chars().count(),
                response_length: response.chars().count(),
                synthetic_trace,
                analysis: self.classifier.classify(message),
            },
            reasoning: Reasoning {
                step_count: steps.len(),
                steps,
                flow_data,
            },
            response,
            session_id,
        })
    }
}

fn validate_message(message: &str) -> AppResult<()> {
    if message.trim().is_empty() {
        return Err(AppError::InvalidRequest {
            message: "Message is required".to_string(),
        });
    }
    Ok(())
}
