//! MCP layer: JSON-RPC types, tool catalog, dispatcher, and transports

pub mod registry;
pub mod server;
pub mod tools;
pub mod types;

pub use registry::{ToolContext, ToolFuture, ToolHandler, ToolRegistry, ToolSpec};
pub use server::{messages_handler, sse_handler, McpServer};
pub use types::{
    McpError, McpRequest, McpResponse, Tool, ToolCall, ToolContent, ToolResult, PROTOCOL_VERSION,
};
