//! MCP protocol types
//!
//! JSON-RPC 2.0 envelopes plus the tool catalog structures exposed to
//! calling agents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version advertised during initialization
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (unique identifier)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON-Schema-like input shape; descriptive metadata for the calling
    /// agent, not enforced server-side beyond the target endpoint's checks
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// A tool invocation extracted from a `tools/call` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One content item in a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl ToolContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ToolContent::Text { text: text.into() }
    }
}

/// Result payload of a `tools/call`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    /// Success result carrying the upstream JSON rendered as text
    pub fn success(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ToolContent::text(text)],
            is_error: false,
        }
    }

    /// Error result delivered inside a successful envelope
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            content: vec![ToolContent::text(message.into())],
            is_error: true,
        }
    }
}

/// JSON-RPC request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Request id; absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response envelope carrying the original request id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error codes used by the dispatcher
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: error_codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    pub fn invalid_params<S: Into<String>>(message: S) -> Self {
        Self {
            code: error_codes::INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self {
            code: error_codes::INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(McpError::method_not_found("x").code, -32601);
        assert_eq!(McpError::invalid_params("x").code, -32602);
        assert_eq!(McpError::internal_error("x").code, -32603);
    }

    #[test]
    fn test_response_serialization_echoes_id() {
        let response = McpResponse::success(json!(7), json!({"ok": true}));
        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(rendered["jsonrpc"], json!("2.0"));
        assert_eq!(rendered["id"], json!(7));
        assert!(rendered.get("error").is_none());
    }

    #[test]
    fn test_tool_result_shapes() {
        let ok = ToolResult::success(&json!({"a": 1}));
        assert!(!ok.is_error);
        let err = ToolResult::error("Unknown tool: frobnicate");
        assert!(err.is_error);
        let rendered = serde_json::to_value(&err).unwrap();
        assert_eq!(rendered["content"][0]["type"], json!("text"));
        assert!(rendered["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("frobnicate"));
    }

    #[test]
    fn test_request_parsing_without_id() {
        let request: McpRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(request.id.is_none());
        assert!(request.params.is_none());
    }
}
