use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub graph: GraphConfig,
    pub keywords: KeywordConfig,
}

/// Remote Bedrock agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub region: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Allowed CORS origins; empty means permissive.
    pub cors_origins: Vec<String>,
    /// Built UI directory served for non-API paths.
    pub static_dir: Option<PathBuf>,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Transport settings handed to the AWS SDK client
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_attempts: u32,
}

/// Display data for the fixed nodes of the flow graph
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub model_label: String,
    pub model_service_tag: String,
}

/// Keyword lists used by the display heuristics
#[derive(Debug, Clone)]
pub struct KeywordConfig {
    pub web_search: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let agent = AgentConfig {
            agent_id: env::var("BEDROCK_AGENT_ID")
                .ok()
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| AppError::Config {
                    message: "BEDROCK_AGENT_ID is required".to_string(),
                })?,
            agent_alias_id: env::var("BEDROCK_AGENT_ALIAS_ID")
                .unwrap_or_else(|_| "TSTALIASID".to_string()),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "ap-south-1".to_string()),
        };

        let environment = match env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            environment,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            static_dir: env::var("STATIC_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120_000),
            max_attempts: env::var("REQUEST_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(3),
        };

        let graph = GraphConfig {
            model_label: env::var("MODEL_LABEL").unwrap_or_else(|_| "Nova Pro Model".to_string()),
            model_service_tag: env::var("MODEL_SERVICE_TAG").unwrap_or_else(|_| "nova".to_string()),
        };

        let keywords = match env::var("WEB_SEARCH_KEYWORDS") {
            Ok(list) if !split_list(&list).is_empty() => KeywordConfig {
                web_search: split_list(&list),
            },
            _ => KeywordConfig::default(),
        };

        Ok(Config {
            agent,
            server,
            logging,
            request,
            graph,
            keywords,
        })
    }
}

impl ServerConfig {
    /// Whether diagnostic error details may be shown to clients.
    pub fn exposes_error_details(&self) -> bool {
        self.environment != Environment::Production
    }
}

impl Environment {
    /// Lowercase name used in health output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Development,
            cors_origins: Vec::new(),
            static_dir: None,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_attempts: 3,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            model_label: "Nova Pro Model".to_string(),
            model_service_tag: "nova".to_string(),
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            web_search: [
                "web-search",
                "websearch",
                "web_search",
                "search",
                "tavily",
                "serp",
                "latest",
                "current",
                "news",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl KeywordConfig {
    /// Whether `text` mentions any web-search keyword (case-insensitive).
    pub fn mentions_web_search(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.web_search.iter().any(|k| lower.contains(k.as_str()))
    }
}
