//! MCP Server implementation
//!
//! Transport-agnostic JSON-RPC dispatcher. The stdio loop lives here; the
//! HTTP and SSE transports feed messages in through [`McpServer::handle_message`]
//! together with the request headers of the call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::HeaderMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::auth::AuthGate;
use crate::error::Result;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::*;
use crate::repository::JokeRepository;

/// MCP Server info
pub const SERVER_NAME: &str = "jokes";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for jokes
pub struct McpServer {
    /// Tool handler
    tool_handler: ToolHandler,

    /// Gate in front of every tool call
    auth: AuthGate,

    /// Whether the client sent `notifications/initialized`
    initialized: AtomicBool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(repository: Arc<dyn JokeRepository>, auth: AuthGate) -> Self {
        Self {
            tool_handler: ToolHandler::new(repository),
            auth,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Run the server on stdio
    ///
    /// One JSON-RPC message per line in, one response per line out. Returns
    /// when stdin closes.
    pub async fn run_stdio(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        tracing::info!("MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            // Stdio calls carry no HTTP request and are trusted
            if let Some(response) = self.handle_message(&line, None).await {
                let mut response_str = serde_json::to_string(&response)?;
                response_str.push('\n');
                stdout.write_all(response_str.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle an incoming JSON-RPC message
    ///
    /// `request` carries the HTTP headers of the call for network transports
    /// and is `None` for stdio. Returns `None` for notifications.
    pub async fn handle_message(
        &self,
        message: &str,
        request: Option<&HeaderMap>,
    ) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Unparseable message: {}", e);
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        let request_id = raw
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

        let rpc: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(rpc) => rpc,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    request_id,
                    JsonRpcError::invalid_request(e.to_string()),
                ));
            }
        };

        if rpc.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                rpc.response_id(),
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}",
                    rpc.jsonrpc
                )),
            ));
        }

        if rpc.is_notification() {
            self.handle_notification(&rpc);
            return None;
        }

        tracing::debug!("Handling request: {}", rpc.method);
        let id = rpc.response_id();

        let result = match rpc.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(),
            methods::PING => Ok(serde_json::json!({})),
            methods::LIST_TOOLS => self.handle_list_tools(),
            methods::CALL_TOOL => self.handle_call_tool(rpc.params, request).await,
            _ => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::method_not_found(&rpc.method),
                ));
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                tracing::error!("Failed to handle {}: {}", rpc.method, e);
                JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
            }
        })
    }

    fn handle_notification(&self, rpc: &JsonRpcRequest) {
        match rpc.method.as_str() {
            methods::INITIALIZED => {
                self.initialized.store(true, Ordering::SeqCst);
                tracing::info!("Client initialized");
            }
            other => tracing::debug!("Ignoring notification: {}", other),
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self) -> Result<Value> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> Result<Value> {
        let result = ListToolsResult {
            tools: self.tool_handler.list_tools(),
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request
    ///
    /// Tool failures, including rejected credentials, come back as an error
    /// tool result rather than a JSON-RPC error.
    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        request: Option<&HeaderMap>,
    ) -> Result<Value> {
        let params: CallToolParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return Ok(serde_json::to_value(CallToolResult::error(
                    "Missing tool parameters",
                ))?);
            }
            Err(e) => {
                return Ok(serde_json::to_value(CallToolResult::error(format!(
                    "Invalid tool parameters: {}",
                    e
                )))?);
            }
        };

        let name = params.name;
        let arguments = params.arguments;
        let outcome = self
            .auth
            .authenticate_and_invoke(request, |context| {
                self.tool_handler.call_tool(&name, arguments, context)
            })
            .await;

        let result = match outcome {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", name, e);
                CallToolResult::error(e.to_string())
            }
        };

        Ok(serde_json::to_value(result)?)
    }
}
