use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Graph synthesis error: {0}")]
    Graph(#[from] GraphSynthesisError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Remote agent invocation errors
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Bedrock Agent failed: {message}")]
    Invocation { message: String },

    #[error("Bedrock Agent timed out: {message}")]
    Timeout { message: String },

    #[error("Agent invocation cancelled")]
    Cancelled,
}

/// Errors raised while deriving optional fields of a reasoning step.
///
/// Never leaves the extractor: each one is replaced by the field's default.
#[derive(Debug, Error)]
pub enum TraceExtractionError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Missing {field}")]
    MissingField { field: &'static str },
}

/// Flow graph invariant violations
#[derive(Debug, Error)]
pub enum GraphSynthesisError {
    #[error("Graph invariant violated: {message}")]
    InvariantViolation { message: String },
}

impl AppError {
    /// Stable error-kind tag exposed to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config { .. } => "configuration_error",
            AppError::InvalidRequest { .. } => "bad_request",
            AppError::Agent(AgentError::Invocation { .. }) => "agent_invocation_error",
            AppError::Agent(AgentError::Timeout { .. }) => "agent_timeout",
            AppError::Agent(AgentError::Cancelled) => "cancelled",
            AppError::Graph(_) => "graph_synthesis_error",
            AppError::Internal { .. } => "internal_error",
        }
    }

    /// Message safe to show end users. Request validation messages are shown
    /// as is; everything else is generic.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidRequest { message } => message.clone(),
            AppError::Config { .. } => "Service is not configured".to_string(),
            AppError::Agent(AgentError::Invocation { .. }) => {
                "The reasoning agent failed to respond".to_string()
            }
            AppError::Agent(AgentError::Timeout { .. }) => {
                "The reasoning agent timed out".to_string()
            }
            AppError::Agent(AgentError::Cancelled) => "Request cancelled".to_string(),
            AppError::Graph(_) | AppError::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for optional-field extraction
pub type ExtractionResult<T> = Result<T, TraceExtractionError>;
