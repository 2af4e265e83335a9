use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registration/execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Database/migration error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Confirmation relay error.
    #[error("Confirmation error: {0}")]
    Relay(#[from] RelayError),

    /// Internal protocol type error.
    #[error("Proto error: {0}")]
    Proto(#[from] ProtoError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// LLM provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// Provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// Runtime exceeded configured tool-call rounds.
    #[error("Max tool rounds exceeded")]
    MaxToolRoundsExceeded,

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Tool argument errors that map onto a structured `{code, message}` result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// A path argument was blank.
    #[error("path must not be empty")]
    EmptyPath,

    /// A path argument resolved outside the tool's sandbox root.
    #[error("path '{0}' is outside the workspace")]
    OutsideWorkspace(String),
}

impl ToolError {
    /// Machine-readable code used in structured tool errors.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::EmptyPath => "invalid_path",
            ToolError::OutsideWorkspace(_) => "path_outside_workspace",
        }
    }
}

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx operation error.
    #[error("SQLx error: {0}")]
    Sqlx(String),

    /// Migration execution error.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Confirmation relay errors.
///
/// Double resolution of a ticket is not an error: the second `confirm()` or
/// `cancel()` is silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// No UI handler is registered to ask the user.
    #[error("No confirmation handler registered")]
    NoConfirmationHandler,

    /// Another confirmation is still outstanding on this relay.
    #[error("A confirmation is already pending")]
    AlreadyPending,
}

/// Internal proto errors
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Invalid role string value.
    #[error("Invalid role: {0}")]
    InvalidRole(String),
}
