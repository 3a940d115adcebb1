//! Agent invocation.
//!
//! [`AgentClient`] is the seam to the remote agent: it opens one trace-enabled
//! streaming call and yields text and trace chunks. [`BedrockAgentClient`] is
//! the production implementation. [`AgentInvoker`] consumes a stream into an
//! [`AgentTurn`], turning trace chunks into reasoning steps as they arrive.

mod bedrock;
mod types;

pub use bedrock::*;
pub use types::*;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AgentError, AgentResult};
use crate::trace::{ReasoningStep, TraceExtractor};

/// One chunk of the agent's response stream.
#[derive(Debug, Clone)]
pub enum AgentChunk {
    /// UTF-8 text fragment of the answer.
    Text(String),
    /// Execution telemetry fragment.
    Trace(RawTrace),
}

/// Ordered chunk stream of one call. An `Err` item ends the call.
pub type ChunkStream = BoxStream<'static, AgentResult<AgentChunk>>;

/// Parameters of one agent call. Tracing is always requested and the session
/// is never ended by the call.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub session_id: String,
    pub input_text: String,
}

/// Client for the remote agent's streaming invocation API.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Identifier of the agent this client talks to.
    fn agent_id(&self) -> &str;

    /// Issue the request and return its chunk stream.
    async fn open_stream(&self, request: AgentRequest) -> AgentResult<ChunkStream>;
}

/// Result of one completed agent call.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    /// Concatenation of every text chunk in arrival order.
    pub final_text: String,
    pub steps: Vec<ReasoningStep>,
    pub session_id: String,
}

/// Runs one agent call per turn and folds its stream into an [`AgentTurn`].
#[derive(Clone)]
pub struct AgentInvoker {
    client: Arc<dyn AgentClient>,
    extractor: TraceExtractor,
}

impl AgentInvoker {
    pub fn new(client: Arc<dyn AgentClient>, extractor: TraceExtractor) -> Self {
        Self { client, extractor }
    }

    pub fn agent_id(&self) -> &str {
        self.client.agent_id()
    }

    /// Invoke the agent and collect the whole turn.
    pub async fn invoke(
        &self,
        input_text: &str,
        session_id: Option<String>,
        cancel: &CancellationToken,
    ) -> AgentResult<AgentTurn> {
        self.invoke_with(input_text, session_id, cancel, |_| {}).await
    }

    /// Invoke the agent, calling `on_step` for each reasoning step as soon as
    /// its trace chunk has been extracted.
    ///
    /// Any stream failure or a cancellation discards the text received so far.
    pub async fn invoke_with<F>(
        &self,
        input_text: &str,
        session_id: Option<String>,
        cancel: &CancellationToken,
        mut on_step: F,
    ) -> AgentResult<AgentTurn>
    where
        F: FnMut(&ReasoningStep) + Send,
    {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let start = Instant::now();

        info!(
            agent_id = %self.client.agent_id(),
            session_id = %session_id,
            input_len = input_text.chars().count(),
            "Invoking agent"
        );

        let request = AgentRequest {
            session_id: session_id.clone(),
            input_text: input_text.to_string(),
        };

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            opened = self.client.open_stream(request) => opened,
        };
        let mut stream = opened.map_err(|e| {
            log_failure(&session_id, &e, start);
            e
        })?;

        let mut final_text = String::new();
        let mut steps = Vec::new();
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Err(AgentError::Cancelled)),
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Ok(AgentChunk::Text(text))) => {
                    chunks += 1;
                    final_text.push_str(&text);
                }
                Some(Ok(AgentChunk::Trace(raw))) => {
                    chunks += 1;
                    match self.extractor.extract(&raw) {
                        Some(step) => {
                            on_step(&step);
                            steps.push(step);
                        }
                        None => debug!(session_id = %session_id, "Skipped unrecognized trace fragment"),
                    }
                }
                Some(Err(e)) => {
                    log_failure(&session_id, &e, start);
                    return Err(e);
                }
            }
        }

        info!(
            session_id = %session_id,
            chunks,
            steps = steps.len(),
            response_len = final_text.chars().count(),
            latency_ms = start.elapsed().as_millis(),
            "Agent call completed"
        );

        Ok(AgentTurn {
            final_text,
            steps,
            session_id,
        })
    }
}

fn log_failure(session_id: &str, err: &AgentError, start: Instant) {
    let latency_ms = start.elapsed().as_millis();
    if matches!(err, AgentError::Cancelled) {
        warn!(session_id = %session_id, latency_ms, "Agent call cancelled");
    } else {
        error!(session_id = %session_id, error = %err, latency_ms, "Agent call failed");
    }
}
