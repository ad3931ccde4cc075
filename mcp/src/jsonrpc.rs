//! Generic JSON-RPC 2.0 envelope types.
//!
//! Shared by [`crate::acp`]'s stdio transport and, potentially, by an HTTP
//! framing of the same calls. Nothing here is specific to either the tool
//! protocol or the agent-client protocol; both layer their own method names
//! and params/result shapes on top.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `"2.0"` — the only JSON-RPC version this crate speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request id: either a number or a string, matching the spec's
/// `id` union. Notifications (no response expected) omit `id` entirely at
/// the call site rather than constructing one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::String(s) => write!(f, "{s}"),
        }
    }
}

/// An inbound JSON-RPC request or notification.
///
/// `id` is `None` for a notification (no response is sent back, matching
/// `session.cancel`'s fire-and-forget semantics in the agent-client
/// protocol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: JsonRpcId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// A notification: same shape, but no `id`, so the callee must not reply.
    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Standard JSON-RPC 2.0 error codes relevant to this crate's own failure
/// modes. Method-specific failures use the `-32000..-32099` "server error"
/// range via [`JsonRpcError::server_error`].
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(error_codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, msg.into())
    }

    pub fn server_error(code_offset: i64, msg: impl Into<String>) -> Self {
        let code = -32000 - code_offset.clamp(0, 99);
        Self::new(code, msg.into())
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jsonrpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// An outbound JSON-RPC response: exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: JsonRpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: JsonRpcId, result: serde_json::Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: Some(result), error: None }
    }

    pub fn failure(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: None, error: Some(error) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_has_no_id() {
        let req = JsonRpcRequest::notification("session.cancel", None);
        assert!(req.is_notification());
        let encoded = serde_json::to_string(&req).unwrap();
        assert!(!encoded.contains("\"id\""));
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = JsonRpcRequest::new(
            "session.prompt",
            Some(serde_json::json!({"session_id": "s1", "text": "hi"})),
            JsonRpcId::Number(7),
        );
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: JsonRpcRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.method, "session.prompt");
        assert_eq!(decoded.id, Some(JsonRpcId::Number(7)));
    }

    #[test]
    fn server_error_offset_is_clamped_into_reserved_range() {
        let err = JsonRpcError::server_error(5, "budget exceeded");
        assert_eq!(err.code, -32005);
        let err = JsonRpcError::server_error(500, "clamped");
        assert_eq!(err.code, -32099);
    }
}
