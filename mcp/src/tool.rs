//! Wire-level tool/resource description shapes shared by HTTP tool-protocol
//! transports.
//!
//! These mirror the `ToolMetadata`/`ToolResult` shapes the root crate's
//! `tool_protocol`/`mcp_http_adapter` modules already serialize over HTTP,
//! kept here as the one definition multiple transports (HTTP today, stdio
//! tomorrow) can agree on without each re-declaring the JSON shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool's JSON-Schema-described parameters, name, and description, as it
/// crosses the wire to a remote caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema object for the accepted arguments.
    pub parameters_schema: serde_json::Value,
}

/// `POST /tools/list` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDescriptor>,
}

/// `POST /tools/execute` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecuteRequest {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// `POST /tools/execute` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecuteResponse {
    pub success: bool,
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A named, URI-addressed piece of context a tool server can expose
/// alongside its tools (files, memory snippets, etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceListResponse {
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReadRequest {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReadResponse {
    pub uri: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
