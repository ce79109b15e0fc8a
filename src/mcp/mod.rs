//! MCP (Model Context Protocol) server for SonarQube metrics.
//!
//! Provides a JSON-RPC 2.0 interface over stdio so that AI assistants can
//! query project listings, coverage, duplication and issues.

/// MCP server implementation.
pub mod server;

/// Tool definitions and dispatch.
pub mod tools;

/// JSON-RPC 2.0 transport types.
pub mod transport;

pub use server::McpServer;
pub use tools::{get_tool_definitions, Tool, ToolCall, ToolDefinition, ToolRegistry};
pub use transport::{ErrorCode, Incoming, JsonRpcError, JsonRpcResponse};
