//! Shared fixtures: test configuration and a scripted agent client.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use transparai::agent::{AgentChunk, AgentClient, AgentRequest, ChunkStream, RawTrace};
use transparai::config::{
    AgentConfig, Config, Environment, GraphConfig, KeywordConfig, LogFormat, LoggingConfig,
    RequestConfig, ServerConfig,
};
use transparai::error::{AgentError, AgentResult};

pub const AGENT_ID: &str = "AGENT123";

/// Create test configuration for the given environment
pub fn create_test_config(environment: Environment) -> Config {
    Config {
        agent: AgentConfig {
            agent_id: AGENT_ID.to_string(),
            agent_alias_id: "TSTALIASID".to_string(),
            region: "ap-south-1".to_string(),
        },
        server: ServerConfig {
            environment,
            ..ServerConfig::default()
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig::default(),
        graph: GraphConfig::default(),
        keywords: KeywordConfig::default(),
    }
}

/// What the scripted agent does when a stream is opened.
pub enum Script {
    /// Yield these chunks, then end.
    Chunks(Vec<AgentResult<AgentChunk>>),
    /// Yield these chunks, then never end.
    Hang(Vec<AgentResult<AgentChunk>>),
    /// Fail before any chunk.
    Fail(AgentError),
}

/// Agent client that replays one script per call.
pub struct ScriptedAgent {
    script: Mutex<Option<Script>>,
    pub requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Some(script)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    fn agent_id(&self) -> &str {
        AGENT_ID
    }

    async fn open_stream(&self, request: AgentRequest) -> AgentResult<ChunkStream> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .script
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Script::Chunks(Vec::new()));

        match script {
            Script::Chunks(chunks) => Ok(stream::iter(chunks).boxed()),
            Script::Hang(chunks) => Ok(stream::iter(chunks).chain(stream::pending()).boxed()),
            Script::Fail(err) => Err(err),
        }
    }
}

pub fn text(value: &str) -> AgentResult<AgentChunk> {
    Ok(AgentChunk::Text(value.to_string()))
}

/// Trace chunk from the agent's camelCase wire JSON.
pub fn trace(value: Value) -> AgentResult<AgentChunk> {
    let raw: RawTrace = serde_json::from_value(value).expect("valid trace fragment");
    Ok(AgentChunk::Trace(raw))
}
