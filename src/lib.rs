//! # TransparAI
//!
//! Backend for a chat UI that shows how a remote Bedrock Agent reasons. Each
//! chat turn invokes the agent with tracing enabled, turns its trace fragments
//! into reasoning steps, and builds a flow graph for visualization.
//!
//! ## Pipeline
//!
//! ```text
//! HTTP/SSE → ChatService → AgentInvoker → AgentClient (Bedrock InvokeAgent)
//!                               ↓
//!                        TraceExtractor → ReasoningStep*
//!                               ↓  (none? SyntheticTraceGenerator)
//!              ResponseAssembler + GraphSynthesizer → ChatResponse
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transparai::{agent::BedrockAgentClient, chat::ChatService, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = BedrockAgentClient::from_config(&config.agent, &config.request).await;
//!     let chat = ChatService::new(Arc::new(client), &config);
//!     let turn = chat.chat("What is a neural network?", None, &CancellationToken::new()).await?;
//!     println!("{} ({} steps)", turn.response, turn.reasoning.step_count);
//!     Ok(())
//! }
//! ```

/// Remote agent client seam, Bedrock client and invocation.
pub mod agent;
/// Chat turns over JSON and event streams.
pub mod chat;
/// Configuration management.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Flow graph model and synthesis.
pub mod graph;
/// Canned replies and narratives.
pub mod messages;
/// Final answer guardrail.
pub mod response;
/// HTTP transport.
pub mod server;
/// Reasoning steps, trace extraction and synthetic traces.
pub mod trace;

pub use chat::{ChatResponse, ChatService};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{router, AppState, SharedState};
