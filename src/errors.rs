use thiserror::Error;

use crate::mcp::transport::ErrorCode;

/// Errors that can occur while talking to the analysis platform.
#[derive(Error, Debug)]
pub enum SonarError {
    #[error("component '{component}' not found in SonarQube (HTTP 404)")]
    NotFound { component: String },

    #[error("unauthorized (HTTP 401): invalid or missing SonarQube credentials")]
    Unauthorized,

    #[error("SonarQube API error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("error connecting to SonarQube: {message}")]
    Connection { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("config error: {message}")]
    Config { message: String },
}

/// Convenience alias for results using `SonarError`.
pub type Result<T> = std::result::Result<T, SonarError>;

/// Errors produced while resolving and running a tool call.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error(transparent)]
    Client(#[from] SonarError),
}

impl ToolError {
    /// The JSON-RPC error code this failure is reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownTool(_) => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::Client(_) => ErrorCode::InternalError,
        }
    }
}
