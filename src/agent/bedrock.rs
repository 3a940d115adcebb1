use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockagentruntime::config::Region;
use aws_sdk_bedrockagentruntime::error::{DisplayErrorContext, SdkError};
use aws_sdk_bedrockagentruntime::types as sdk;
use aws_sdk_bedrockagentruntime::Client;
use futures::future::ready;
use futures::StreamExt;
use tracing::{debug, info};

use super::{
    ActionGroupInvocationInput, AgentChunk, AgentClient, AgentRequest, ChunkStream,
    InvocationInput, KnowledgeBaseLookupInput, KnowledgeBaseLookupOutput, ModelInvocationInput,
    Observation, OrchestrationDetail, PostProcessingDetail, PostProcessingOutput,
    PreProcessingDetail, PreProcessingOutput, PreProcessingParsedResponse, RawParameter, RawTrace,
    TextPayload,
};
use crate::config::{AgentConfig, RequestConfig};
use crate::error::{AgentError, AgentResult};

/// [`AgentClient`] backed by the Bedrock Agent Runtime `InvokeAgent` API.
#[derive(Clone)]
pub struct BedrockAgentClient {
    client: Client,
    agent_id: String,
    agent_alias_id: String,
}

impl BedrockAgentClient {
    /// Load AWS credentials from the default provider chain and build a client
    /// for the configured agent.
    pub async fn from_config(agent: &AgentConfig, request: &RequestConfig) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_millis(request.timeout_ms))
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(agent.region.clone()))
            .timeout_config(timeouts)
            .retry_config(RetryConfig::standard().with_max_attempts(request.max_attempts))
            .load()
            .await;

        info!(
            agent_id = %agent.agent_id,
            alias_id = %agent.agent_alias_id,
            region = %agent.region,
            timeout_ms = request.timeout_ms,
            "Bedrock agent client configured"
        );

        Self::new(Client::new(&sdk_config), agent)
    }

    /// Wrap an existing SDK client.
    pub fn new(client: Client, agent: &AgentConfig) -> Self {
        Self {
            client,
            agent_id: agent.agent_id.clone(),
            agent_alias_id: agent.agent_alias_id.clone(),
        }
    }
}

#[async_trait]
impl AgentClient for BedrockAgentClient {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    async fn open_stream(&self, request: AgentRequest) -> AgentResult<ChunkStream> {
        debug!(
            session_id = %request.session_id,
            alias_id = %self.agent_alias_id,
            "Calling InvokeAgent"
        );

        let output = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.agent_alias_id)
            .session_id(request.session_id)
            .input_text(request.input_text)
            .enable_trace(true)
            .end_session(false)
            .send()
            .await
            .map_err(agent_error)?;

        // The receiver is dropped after the first error so the stream ends there.
        let stream = futures::stream::unfold(Some(output.completion), |state| async move {
            let mut receiver = state?;
            match receiver.recv().await {
                Ok(Some(event)) => Some((chunk_from_event(event).map(Ok), Some(receiver))),
                Ok(None) => None,
                Err(e) => Some((Some(Err(agent_error(e))), None)),
            }
        })
        .filter_map(ready)
        .boxed();

        Ok(stream)
    }
}

/// Map an SDK failure to [`AgentError`], keeping timeouts distinct.
fn agent_error<E, R>(err: SdkError<E, R>) -> AgentError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let timed_out = match &err {
        SdkError::TimeoutError(_) => true,
        SdkError::DispatchFailure(failure) => failure.is_timeout(),
        _ => false,
    };

    if timed_out {
        AgentError::Timeout { message }
    } else {
        AgentError::Invocation { message }
    }
}

/// Event kinds other than text and trace (files, return control) carry nothing
/// for the turn and are skipped.
fn chunk_from_event(event: sdk::ResponseStream) -> Option<AgentChunk> {
    match event {
        sdk::ResponseStream::Chunk(part) => part
            .bytes
            .map(|bytes| AgentChunk::Text(String::from_utf8_lossy(bytes.as_ref()).into_owned())),
        sdk::ResponseStream::Trace(part) => {
            Some(AgentChunk::Trace(part.trace.map(raw_trace).unwrap_or_default()))
        }
        _ => None,
    }
}

/// Trace kinds without a phase record (guardrail, failure, routing) become an
/// empty fragment, which the extractor skips.
fn raw_trace(trace: sdk::Trace) -> RawTrace {
    match trace {
        sdk::Trace::PreProcessingTrace(trace) => RawTrace::pre_processing(pre_processing(trace)),
        sdk::Trace::OrchestrationTrace(trace) => RawTrace::orchestration(orchestration(trace)),
        sdk::Trace::PostProcessingTrace(trace) => {
            RawTrace::post_processing(post_processing(trace))
        }
        _ => RawTrace::default(),
    }
}

fn model_input(input: sdk::ModelInvocationInput) -> ModelInvocationInput {
    ModelInvocationInput {
        text: input.text,
        prompt_type: input.r#type.map(|kind| kind.as_str().to_string()),
    }
}

fn text_payload(text: Option<String>) -> Option<TextPayload> {
    text.map(|text| TextPayload { text: Some(text) })
}

fn pre_processing(trace: sdk::PreProcessingTrace) -> PreProcessingDetail {
    match trace {
        sdk::PreProcessingTrace::ModelInvocationInput(input) => PreProcessingDetail {
            model_invocation_input: Some(model_input(input)),
            ..Default::default()
        },
        sdk::PreProcessingTrace::ModelInvocationOutput(output) => PreProcessingDetail {
            model_invocation_output: Some(PreProcessingOutput {
                parsed_response: output.parsed_response.map(|parsed| {
                    PreProcessingParsedResponse {
                        rationale: parsed.rationale,
                        is_valid: parsed.is_valid,
                    }
                }),
            }),
            ..Default::default()
        },
        _ => PreProcessingDetail::default(),
    }
}

fn orchestration(trace: sdk::OrchestrationTrace) -> OrchestrationDetail {
    match trace {
        sdk::OrchestrationTrace::Rationale(rationale) => OrchestrationDetail {
            rationale: text_payload(rationale.text),
            ..Default::default()
        },
        sdk::OrchestrationTrace::InvocationInput(input) => OrchestrationDetail {
            invocation_input: Some(InvocationInput {
                action_group_invocation_input: input
                    .action_group_invocation_input
                    .map(action_group_input),
                knowledge_base_lookup_input: input.knowledge_base_lookup_input.map(|lookup| {
                    KnowledgeBaseLookupInput {
                        text: lookup.text,
                        knowledge_base_id: lookup.knowledge_base_id,
                        result_count: None,
                    }
                }),
            }),
            ..Default::default()
        },
        sdk::OrchestrationTrace::Observation(observation) => OrchestrationDetail {
            observation: Some(Observation {
                final_response: observation
                    .final_response
                    .and_then(|response| text_payload(response.text)),
                action_group_invocation_output: observation
                    .action_group_invocation_output
                    .and_then(|output| text_payload(output.text)),
                knowledge_base_lookup_output: observation.knowledge_base_lookup_output.map(
                    |output| KnowledgeBaseLookupOutput {
                        retrieved_references: output
                            .retrieved_references
                            .unwrap_or_default()
                            .iter()
                            .map(|reference| serde_json::Value::String(format!("{:?}", reference)))
                            .collect(),
                    },
                ),
                reprompt_response: observation
                    .reprompt_response
                    .and_then(|response| text_payload(response.text)),
            }),
            ..Default::default()
        },
        sdk::OrchestrationTrace::ModelInvocationInput(input) => OrchestrationDetail {
            model_invocation_input: Some(model_input(input)),
            ..Default::default()
        },
        _ => OrchestrationDetail::default(),
    }
}

fn action_group_input(input: sdk::ActionGroupInvocationInput) -> ActionGroupInvocationInput {
    ActionGroupInvocationInput {
        action_group_name: input.action_group_name,
        verb: input.verb,
        api_path: input.api_path,
        function: input.function,
        parameters: input
            .parameters
            .unwrap_or_default()
            .into_iter()
            .map(|parameter| RawParameter {
                name: parameter.name,
                value: parameter.value,
            })
            .collect(),
    }
}

fn post_processing(trace: sdk::PostProcessingTrace) -> PostProcessingDetail {
    match trace {
        sdk::PostProcessingTrace::ModelInvocationInput(input) => PostProcessingDetail {
            model_invocation_input: Some(model_input(input)),
            ..Default::default()
        },
        sdk::PostProcessingTrace::ModelInvocationOutput(output) => PostProcessingDetail {
            model_invocation_output: Some(PostProcessingOutput {
                parsed_response: output
                    .parsed_response
                    .map(|parsed| TextPayload { text: parsed.text }),
            }),
            ..Default::default()
        },
        _ => PostProcessingDetail::default(),
    }
}
