//! Error types and handling for the CRM proxy

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Result type alias for CRM proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Main error type for the CRM proxy
///
/// Errors are raised as typed values through every layer and converted to a
/// transport representation exactly once at the boundary: the [`ResponseError`]
/// impl for the REST surface, [`crate::mcp::McpError`] for the tool surface.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// No resolvable bearer token for an upstream call
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Invalid inbound request (unknown entity type, bad verb, missing field)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Vendor 404
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Vendor responded with an error status (>= 400, other than 404)
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Upstream call exceeded the configured request timeout
    #[error("Upstream timeout: {message}")]
    Timeout { message: String },

    /// Upstream host could not be reached
    #[error("Upstream unreachable: {message}")]
    Unreachable { message: String },

    /// MCP protocol errors
    #[error("MCP protocol error: {message}")]
    Mcp { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an upstream error carrying the vendor status and body
    pub fn upstream<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an unreachable error
    pub fn unreachable<S: Into<String>>(message: S) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Create an MCP protocol error
    pub fn mcp<S: Into<String>>(message: S) -> Self {
        Self::Mcp {
            message: message.into(),
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::Config { .. } => "config",
            ProxyError::Auth { .. } => "auth",
            ProxyError::Validation { .. } => "validation",
            ProxyError::NotFound { .. } => "not_found",
            ProxyError::Upstream { .. } => "upstream",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::Unreachable { .. } => "unreachable",
            ProxyError::Mcp { .. } => "mcp",
            ProxyError::Serde(_) => "serialization",
            ProxyError::Yaml(_) => "yaml",
            ProxyError::Http(_) => "http",
            ProxyError::Io(_) => "io",
        }
    }
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Auth { .. } => StatusCode::UNAUTHORIZED,
            ProxyError::Validation { .. } => StatusCode::BAD_REQUEST,
            ProxyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::Upstream { .. }
            | ProxyError::Timeout { .. }
            | ProxyError::Unreachable { .. }
            | ProxyError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.category(),
        });
        if let ProxyError::Upstream { status, .. } = self {
            body["upstream_status"] = json!(status);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
