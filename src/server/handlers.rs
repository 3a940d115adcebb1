use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::SharedState;
use crate::chat::{ChatEvent, ConnectionTest};
use crate::error::{AgentError, AppError};

/// Service name reported by the health endpoints.
pub const SERVICE_NAME: &str = "TransparAI Backend";

/// Characters of the user's message included in request logs.
const LOG_PREVIEW_CHARS: usize = 50;

/// Chat request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Error response: `{success: false, error, errorKind, details?}`.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub expose_details: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.error {
            AppError::Config { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Agent(AgentError::Invocation { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Agent(AgentError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            // Client closed request
            AppError::Agent(AgentError::Cancelled) => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
            AppError::Graph(_) | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": self.error.public_message(),
            "errorKind": self.error.kind(),
        });
        if self.expose_details {
            body["details"] = Value::String(self.error.to_string());
        }
        (status, Json(body)).into_response()
    }
}

/// Unwrap the request body, turning malformed JSON into a `bad_request`.
fn parse_request(
    state: &SharedState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<ChatRequest, ApiError> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        state.api_error(AppError::InvalidRequest {
            message: rejection.body_text(),
        })
    })
}

fn preview(message: &str) -> String {
    message.chars().take(LOG_PREVIEW_CHARS).collect()
}

/// `POST /api/bedrock/chat`
pub async fn chat(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = parse_request(&state, payload)?;
    info!(message = %preview(&request.message), "Processing chat message");

    let response = state
        .chat
        .chat(&request.message, request.session_id, &CancellationToken::new())
        .await
        .map_err(|e| {
            error!(error = %e, kind = e.kind(), "Chat request failed");
            state.api_error(e)
        })?;

    Ok(Json(json!({ "success": true, "data": response })))
}

/// `POST /api/bedrock/chat/stream`
///
/// Dropping the response body (client disconnect) cancels the agent call.
pub async fn chat_stream(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = parse_request(&state, payload)?;
    info!(message = %preview(&request.message), "Processing streamed chat message");

    let events = state
        .chat
        .clone()
        .chat_stream(request.message, request.session_id, CancellationToken::new())
        .map_err(|e| state.api_error(e))?;

    let stream = UnboundedReceiverStream::new(events).map(|event| Ok(sse_event(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &ChatEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize chat event");
        let err = AppError::Internal {
            message: format!("Failed to serialize chat event: {}", e),
        };
        Event::default().data(internal_error_data(&err))
    })
}

/// Error event payload built without going through [`ChatEvent`] serialization.
fn internal_error_data(err: &AppError) -> String {
    json!({
        "type": "error",
        "error": err.public_message(),
        "errorKind": err.kind(),
    })
    .to_string()
}

/// `GET /api/bedrock/test`
pub async fn test_connection(State(state): State<SharedState>) -> Json<ConnectionTest> {
    Json(state.chat.test_connection().await)
}

fn health_body(state: &SharedState) -> Value {
    json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "region": state.config.agent.region,
        "agentId": "configured",
    })
}

/// `GET /api/health`
pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(health_body(&state))
}

/// `GET /api/health/detailed`
pub async fn health_detailed(State(state): State<SharedState>) -> Json<Value> {
    let credentials_configured = std::env::var("AWS_ACCESS_KEY_ID").is_ok()
        && std::env::var("AWS_SECRET_ACCESS_KEY").is_ok();

    let mut body = health_body(&state);
    body["aws"] = json!({
        "region": state.config.agent.region,
        "agentConfigured": !state.config.agent.agent_id.is_empty(),
        "credentialsConfigured": credentials_configured,
    });
    body["server"] = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "environment": state.config.server.environment.as_str(),
    });
    Json(body)
}

/// Fallback for unknown `/api/*` paths.
pub async fn api_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "API route not found" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphSynthesisError;

    fn status_of(error: AppError) -> u16 {
        ApiError {
            error,
            expose_details: false,
        }
        .status()
        .as_u16()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AppError::Config {
                message: String::new()
            }),
            503
        );
        assert_eq!(
            status_of(AppError::InvalidRequest {
                message: String::new()
            }),
            400
        );
        assert_eq!(
            status_of(AgentError::Invocation {
                message: String::new()
            }
            .into()),
            502
        );
        assert_eq!(
            status_of(AgentError::Timeout {
                message: String::new()
            }
            .into()),
            504
        );
        assert_eq!(status_of(AgentError::Cancelled.into()), 499);
        assert_eq!(
            status_of(
                GraphSynthesisError::InvariantViolation {
                    message: String::new()
                }
                .into()
            ),
            500
        );
        assert_eq!(
            status_of(AppError::Internal {
                message: String::new()
            }),
            500
        );
    }

    #[test]
    fn test_serialization_failure_payload_is_an_error_event() {
        let err = AppError::Internal {
            message: "Failed to serialize chat event: key must be a string".to_string(),
        };
        let value: Value = serde_json::from_str(&internal_error_data(&err)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "error",
                "error": "Internal server error",
                "errorKind": "internal_error",
            })
        );
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.message.is_empty());
        assert!(request.session_id.is_none());

        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","sessionId":"abc"}"#).unwrap();
        assert_eq!(request.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_error_event_serializes_with_type_tag() {
        let event = ChatEvent::Error {
            error: "Request cancelled".to_string(),
            error_kind: "cancelled",
            details: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["errorKind"], "cancelled");
        assert!(value.get("details").is_none());

        let end = serde_json::to_value(&ChatEvent::End).unwrap();
        assert_eq!(end, json!({ "type": "end" }));
    }
}
