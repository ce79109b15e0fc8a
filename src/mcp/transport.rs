//! JSON-RPC 2.0 transport types for the MCP server.
//!
//! Provides the response envelope, error codes, and the classification of
//! incoming lines into requests and notifications.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON-RPC 2.0 response sent back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version; always `"2.0"`.
    pub jsonrpc: String,
    /// The request identifier that this response corresponds to.
    pub id: Value,
    /// The result on success; absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Creates a successful JSON-RPC response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error JSON-RPC response with the standard message for
    /// `code` and no data.
    pub fn error(id: Value, code: ErrorCode) -> Self {
        Self::error_with(id, code, None)
    }

    /// Creates an error JSON-RPC response carrying `data` as detail.
    pub fn error_with_data(id: Value, code: ErrorCode, data: impl Into<Value>) -> Self {
        Self::error_with(id, code, Some(data.into()))
    }

    fn error_with(id: Value, code: ErrorCode, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: code.as_i32(),
                message: code.message().to_string(),
                data,
            }),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The request is not a valid JSON-RPC request.
    InvalidRequest,
    /// The requested method does not exist.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal server error.
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric error code as defined by JSON-RPC 2.0.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// Returns the standard message for the code.
    pub fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// One decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Carries an `id` key (whatever its value) and expects a response.
    Request {
        id: Value,
        method: Option<String>,
        params: Value,
    },
    /// Has no `id` key; never answered.
    Notification {
        method: Option<String>,
        params: Value,
    },
}

impl Incoming {
    /// Classifies a parsed JSON object. The presence of the `id` key is the
    /// only thing that separates a request from a notification.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let method = object
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);
        let params = match object.remove("params") {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(p) => p,
        };

        match object.remove("id") {
            Some(id) => Self::Request { id, method, params },
            None => Self::Notification { method, params },
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => method.as_deref(),
        }
    }
}
