//! Error types for the Jokes MCP Server
//!
//! This module defines the error hierarchy for all operations in the server.

use thiserror::Error;

/// Main error type for the Jokes MCP Server
#[derive(Error, Debug)]
pub enum JokesMcpError {
    /// Joke API client errors
    #[error("Joke API error: {0}")]
    Api(#[from] JokeApiError),

    /// Repository errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Bearer token authentication errors
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Log output could not be set up
    #[error("Logging setup error: {0}")]
    Logging(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the joke API client
#[derive(Error, Debug)]
pub enum JokeApiError {
    #[error("Timed out waiting for the joke service at {url}")]
    Timeout { url: String },

    #[error("Could not connect to the joke service: {message}")]
    Connection { message: String },

    #[error("Joke service responded with status {status_code}")]
    Http { status_code: u16, body: String },

    #[error("Could not parse the joke service response: {message}")]
    Parse { message: String },
}

impl JokeApiError {
    /// HTTP status code, when the upstream answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            JokeApiError::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Errors at the repository boundary
///
/// `NotFound` is kept apart from `Failed` so callers can tell a missing joke
/// from a transient upstream problem.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Joke with ID {joke_id} not found")]
    NotFound { joke_id: u32 },

    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<JokeApiError>,
    },
}

impl RepositoryError {
    /// Wrap a client error with a repository-level message
    pub fn failed(message: impl Into<String>, source: JokeApiError) -> Self {
        RepositoryError::Failed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// A failure detected by the repository itself, with no upstream cause
    pub fn invalid(message: impl Into<String>) -> Self {
        RepositoryError::Failed {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

/// Bearer token authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication required. Please provide a Bearer token in the Authorization header.")]
    Required,

    #[error("Invalid Authorization header format. Expected 'Bearer <token>'.")]
    Malformed,

    #[error("Authentication failed: Invalid or expired token")]
    Invalid,

    #[error("Authentication error: {message}")]
    Internal { message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },
}

/// Result type alias for Jokes MCP operations
pub type Result<T> = std::result::Result<T, JokesMcpError>;
