//! MCP server that reads JSON-RPC 2.0 messages from stdin and writes
//! responses to stdout.
//!
//! Lines are handled strictly one at a time: a line is read, dispatched and
//! answered before the next one is read.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::client::SonarClient;
use crate::errors::Result;

use super::tools::{get_tool_definitions, ToolRegistry};
use super::transport::{ErrorCode, Incoming, JsonRpcResponse};

/// Protocol version reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "sonarqube-mcp";

/// The MCP server wrapping a `ToolRegistry`.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Creates a new MCP server that serves tools through `client`.
    pub fn new(client: SonarClient) -> Self {
        Self {
            registry: Arc::new(ToolRegistry::new(client)),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serves stdin/stdout until stdin closes or an interrupt arrives,
    /// then closes the client's connection pool.
    pub async fn run(self) -> Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serves `reader`/`writer` until the reader is exhausted or an
    /// interrupt arrives. The client is closed exactly once on either path.
    pub async fn run_with<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(url = self.registry.client().base_url(), "starting SonarQube MCP server");

        let outcome = tokio::select! {
            result = self.serve(reader, writer) => result,
            _ = interrupted() => Ok(()),
        };

        self.registry.client().close();
        info!("SonarQube MCP server shutdown complete");
        outcome
    }

    /// Reads newline-delimited JSON from `reader` and writes one response
    /// line per request to `writer`. Returns when `reader` is exhausted.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        loop {
            let response = match lines.next_line().await {
                Ok(Some(line)) => self.handle_line(&line).await,
                Ok(None) => break,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!("received a line that is not valid UTF-8: {}", e);
                    Some(JsonRpcResponse::error(Value::Null, ErrorCode::ParseError))
                }
                Err(e) => {
                    error!("failed to read from input: {}", e);
                    break;
                }
            };

            if let Some(resp) = response {
                let json_line = match serde_json::to_string(&resp) {
                    Ok(s) => s,
                    Err(e) => {
                        error!("failed to serialize response: {}", e);
                        continue;
                    }
                };
                let output = format!("{}\n", json_line);
                if let Err(e) = writer.write_all(output.as_bytes()).await {
                    error!("failed to write response: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    error!("failed to flush output: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handles one input line.
    ///
    /// Returns `None` for blank lines and notifications; every other line
    /// yields exactly one response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("invalid JSON received: {}", e);
                return Some(JsonRpcResponse::error(Value::Null, ErrorCode::ParseError));
            }
        };

        let object = match value {
            Value::Object(object) => object,
            _ => {
                warn!("received JSON that is not an object");
                return Some(JsonRpcResponse::error_with_data(
                    Value::Null,
                    ErrorCode::InvalidRequest,
                    "expected a JSON object",
                ));
            }
        };

        match Incoming::from_object(object) {
            Incoming::Request { id, method, params } => {
                Some(self.handle_request(id, method, params).await)
            }
            Incoming::Notification { method, .. } => {
                debug!(method = method.as_deref().unwrap_or("<none>"), "notification received");
                None
            }
        }
    }

    /// Runs a request on its own task so that a panicking handler turns
    /// into an internal error instead of taking the loop down.
    async fn handle_request(
        &self,
        id: Value,
        method: Option<String>,
        params: Value,
    ) -> JsonRpcResponse {
        info!(method = method.as_deref().unwrap_or("<none>"), id = %id, "handling request");

        let registry = Arc::clone(&self.registry);
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            dispatch(&registry, task_id, method.as_deref(), &params).await
        });

        match task.await {
            Ok(response) => response,
            Err(e) => {
                error!("request handler failed: {}", e);
                JsonRpcResponse::error_with_data(
                    id,
                    ErrorCode::InternalError,
                    format!("request handler failed: {}", e),
                )
            }
        }
    }
}

/// Routes a request to its method handler.
async fn dispatch(
    registry: &ToolRegistry,
    id: Value,
    method: Option<&str>,
    params: &Value,
) -> JsonRpcResponse {
    match method {
        Some("initialize") => JsonRpcResponse::success(id, initialize_result()),
        Some("ping") => JsonRpcResponse::success(id, json!("pong")),
        Some("tools/list") => JsonRpcResponse::success(id, json!({ "tools": get_tool_definitions() })),
        Some("tools/call") => handle_tools_call(registry, id, params).await,
        Some(other) => {
            warn!(method = other, "unknown method requested");
            JsonRpcResponse::error_with_data(
                id,
                ErrorCode::MethodNotFound,
                format!("Unknown method: {}", other),
            )
        }
        None => JsonRpcResponse::error_with_data(
            id,
            ErrorCode::MethodNotFound,
            "request has no method",
        ),
    }
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed the
/// server keeps serving until its input closes.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received interrupt, shutting down"),
        Err(e) => {
            warn!("cannot listen for interrupt, serving until input closes: {}", e);
            std::future::pending::<()>().await
        }
    }
}

/// Result of the `initialize` method: protocol version, capabilities and
/// server identity.
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Handles the `tools/call` method, dispatching to the appropriate tool handler.
async fn handle_tools_call(registry: &ToolRegistry, id: Value, params: &Value) -> JsonRpcResponse {
    let tool_name = match params.get("name").and_then(Value::as_str) {
        Some(name) => name,
        None => {
            return JsonRpcResponse::error_with_data(
                id,
                ErrorCode::InvalidParams,
                "missing 'name' in tools/call params",
            );
        }
    };

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    info!(tool = tool_name, "tool call");

    match registry.call(tool_name, &arguments).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => {
            if e.code() == ErrorCode::InternalError {
                error!(tool = tool_name, error = %e, "tool execution failed");
            }
            JsonRpcResponse::error_with_data(id, e.code(), e.to_string())
        }
    }
}
