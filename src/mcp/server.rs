//! MCP server: JSON-RPC dispatch plus the SSE and POST transports
//!
//! The dispatcher is transport-agnostic; `sse_handler` and `messages_handler`
//! adapt it to the HTTP surface.

use crate::auth::require_api_token;
use crate::config::Config;
use crate::mcp::registry::{ToolContext, ToolRegistry};
use crate::mcp::types::{
    McpError, McpRequest, McpResponse, ToolCall, ToolResult, PROTOCOL_VERSION,
};
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Interval between SSE keep-alive pings
const SSE_PING_INTERVAL: Duration = Duration::from_secs(15);

/// MCP server handling JSON-RPC requests over SSE and HTTP POST
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
    notifications: broadcast::Sender<Value>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        let (notifications, _) = broadcast::channel(1000);
        Self {
            registry,
            ctx,
            notifications,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Broadcast a server-initiated notification to every SSE subscriber
    pub fn notify(&self, notification: Value) {
        // Send only fails when no subscriber is connected
        let _ = self.notifications.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.notifications.subscribe()
    }

    /// Dispatch one JSON-RPC request. Notifications (no id) get no response.
    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let id = match request.id {
            Some(id) => id,
            None => {
                debug!("Received notification: {}", request.method);
                return None;
            }
        };

        debug!("MCP request: method={}", request.method);

        match request.method.as_str() {
            "initialize" => Some(McpResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": { "listChanged": false }
                    },
                    "serverInfo": {
                        "name": "crmbridge",
                        "version": crate::VERSION,
                    }
                }),
            )),
            "ping" => Some(McpResponse::success(id, json!({}))),
            "tools/list" => Some(McpResponse::success(
                id,
                json!({ "tools": self.registry.catalog() }),
            )),
            "tools/call" => Some(self.handle_tool_call(id, request.params).await),
            other => Some(McpResponse::failure(id, McpError::method_not_found(other))),
        }
    }

    async fn handle_tool_call(&self, id: Value, params: Option<Value>) -> McpResponse {
        let call: ToolCall = match params.map(serde_json::from_value).transpose() {
            Ok(Some(call)) => call,
            Ok(None) => {
                return McpResponse::failure(id, McpError::invalid_params("Missing params"))
            }
            Err(e) => {
                return McpResponse::failure(
                    id,
                    McpError::invalid_params(format!("Invalid tool call params: {}", e)),
                )
            }
        };

        info!("Tool call: {}", call.name);

        let result = match self.registry.dispatch(&self.ctx, &call).await {
            Some(Ok(value)) => ToolResult::success(&value),
            Some(Err(e)) => {
                warn!("Tool {} failed: {}", call.name, e);
                return McpResponse::failure(
                    id,
                    McpError::internal_error(format!("{}: {}", call.name, e)),
                );
            }
            None => ToolResult::error(format!("Unknown tool: {}", call.name)),
        };

        match serde_json::to_value(&result) {
            Ok(rendered) => McpResponse::success(id, rendered),
            Err(e) => McpResponse::failure(id, McpError::internal_error(e.to_string())),
        }
    }
}

fn sse_event(event: &str, data: &str) -> std::result::Result<web::Bytes, actix_web::Error> {
    Ok(web::Bytes::from(format!(
        "event: {}\ndata: {}\n\n",
        event, data
    )))
}

/// GET /mcp/sse: long-lived event stream
///
/// Emits the `endpoint` event first (where to POST messages), then pings
/// every 15 seconds interleaved with any broadcast notifications.
pub async fn sse_handler(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    server: web::Data<Arc<McpServer>>,
) -> actix_web::Result<HttpResponse> {
    require_api_token(&req, &config)?;

    info!("SSE connection established");

    let mut notifications = server.subscribe();
    let stream = async_stream::stream! {
        yield sse_event("endpoint", "/mcp/messages");

        let mut ping = tokio::time::interval(SSE_PING_INTERVAL);
        ping.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                _ = ping.tick() => {
                    let payload = json!({ "timestamp": chrono::Utc::now().to_rfc3339() });
                    yield sse_event("ping", &payload.to_string());
                }
                received = notifications.recv() => {
                    match received {
                        Ok(notification) => {
                            yield sse_event("message", &notification.to_string());
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("SSE subscriber lagged, skipped {} notifications", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    };

    Ok(HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream))
}

/// POST /mcp/messages: one JSON-RPC request per call
pub async fn messages_handler(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    server: web::Data<Arc<McpServer>>,
    request: web::Json<McpRequest>,
) -> actix_web::Result<HttpResponse> {
    require_api_token(&req, &config)?;

    match server.handle(request.into_inner()).await {
        Some(response) => Ok(HttpResponse::Ok().json(response)),
        // Notifications are accepted without a body
        None => Ok(HttpResponse::Accepted().finish()),
    }
}
