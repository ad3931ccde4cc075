//! Agent-client protocol (ACP): the line-delimited JSON-RPC 2.0 surface a
//! host application's REPL would speak over stdio to drive this runtime as
//! a subprocess — `initialize`, `session.new`, `session.prompt`,
//! `session.cancel`, plus session-scoped streaming notifications, exactly as
//! described in spec.md's wire-protocols section. Maximum line length:
//! 65,536 bytes.
//!
//! This module defines the message shapes and a transport that reads/writes
//! them; [`AcpHandler`] is the seam a host (here, `ali_kernel::Orchestrator`)
//! implements to actually answer the calls. Nothing in this crate depends on
//! the root crate, so the dependency only runs one way.

use crate::jsonrpc::{JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Maximum length, in bytes, of a single line on the wire. A line (request,
/// response, or notification) exceeding this is a protocol violation, not a
/// retryable condition.
pub const MAX_LINE_LENGTH: usize = 65_536;

pub const PROTOCOL_VERSION: &str = "0.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub streaming: bool,
    pub tool_calls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_name: String,
    pub server_version: String,
    pub capabilities: ServerCapabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResult {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptParams {
    pub session_id: String,
    pub text: String,
}

/// Why a `session.prompt` call stopped producing updates. Mirrors the
/// orchestrator's turn-level outcomes (a clean finish, a budget gate, or a
/// cooperative cancellation per spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    Cancelled,
    BudgetExceeded,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub session_id: String,
}

/// A `session/update` notification pushed to the client while a prompt is
/// being answered. Sent with no `id` — the client must not reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionUpdate {
    AgentMessageChunk { session_id: String, text: String },
    AgentThoughtChunk { session_id: String, text: String },
    ToolCall { session_id: String, tool_name: String },
    CostUpdate { session_id: String, session_spend_usd: f64 },
}

impl SessionUpdate {
    pub fn into_notification(self) -> JsonRpcRequest {
        JsonRpcRequest::notification("session/update", Some(serde_json::to_value(self).unwrap()))
    }
}

/// Errors this transport/dispatcher can hit, distinct from a per-call
/// [`JsonRpcError`] (which is the wire-level failure sent back to the peer).
#[derive(Debug)]
pub enum AcpError {
    LineTooLong { limit: usize, actual: usize },
    Io(std::io::Error),
    Json(serde_json::Error),
    Closed,
}

impl fmt::Display for AcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcpError::LineTooLong { limit, actual } => {
                write!(f, "line exceeds {limit}-byte limit ({actual} bytes)")
            }
            AcpError::Io(e) => write!(f, "io error: {e}"),
            AcpError::Json(e) => write!(f, "json error: {e}"),
            AcpError::Closed => write!(f, "stream closed"),
        }
    }
}

impl Error for AcpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AcpError::Io(e) => Some(e),
            AcpError::Json(e) => Some(e),
            AcpError::LineTooLong { .. } | AcpError::Closed => None,
        }
    }
}

impl From<std::io::Error> for AcpError {
    fn from(e: std::io::Error) -> Self {
        AcpError::Io(e)
    }
}

impl From<serde_json::Error> for AcpError {
    fn from(e: serde_json::Error) -> Self {
        AcpError::Json(e)
    }
}

/// Line-delimited JSON-RPC 2.0 transport over any `AsyncRead + AsyncWrite`
/// pair — stdio in production, an in-memory duplex pipe in tests.
pub struct AcpStdioTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> AcpStdioTransport<R, W>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader: BufReader::new(reader), writer }
    }

    /// Read the next line and parse it as a [`JsonRpcRequest`] (a call or a
    /// notification). Returns `Ok(None)` on clean EOF.
    pub async fn read_request(&mut self) -> Result<Option<JsonRpcRequest>, AcpError> {
        loop {
            let mut line = String::new();
            let mut limited = (&mut self.reader).take(MAX_LINE_LENGTH as u64 + 1);
            let n = limited.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            if line.as_bytes().len() > MAX_LINE_LENGTH {
                return Err(AcpError::LineTooLong { limit: MAX_LINE_LENGTH, actual: line.len() });
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                // Blank keep-alive line; read again.
                continue;
            }
            let req: JsonRpcRequest = serde_json::from_str(trimmed)?;
            return Ok(Some(req));
        }
    }

    pub async fn write_response(&mut self, resp: &JsonRpcResponse) -> Result<(), AcpError> {
        self.write_line(&serde_json::to_string(resp)?).await
    }

    pub async fn write_notification(&mut self, notification: &JsonRpcRequest) -> Result<(), AcpError> {
        self.write_line(&serde_json::to_string(notification)?).await
    }

    async fn write_line(&mut self, encoded: &str) -> Result<(), AcpError> {
        if encoded.len() > MAX_LINE_LENGTH {
            return Err(AcpError::LineTooLong { limit: MAX_LINE_LENGTH, actual: encoded.len() });
        }
        self.writer.write_all(encoded.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// The seam a host implements to answer ACP calls. Each method corresponds
/// 1:1 to a JSON-RPC method name (`initialize`, `session.new`,
/// `session.prompt`); `cancel` answers the `session.cancel` notification and
/// returns nothing because notifications never get a response.
#[async_trait]
pub trait AcpHandler: Send + Sync {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult, JsonRpcError>;
    async fn new_session(&self, params: NewSessionParams) -> Result<NewSessionResult, JsonRpcError>;
    async fn prompt(
        &self,
        params: PromptParams,
        on_update: &(dyn Fn(SessionUpdate) + Send + Sync),
    ) -> Result<PromptResult, JsonRpcError>;
    async fn cancel(&self, params: CancelParams);
}

/// Dispatch a single parsed [`JsonRpcRequest`] to `handler`, returning the
/// response to write back (`None` for notifications, which never reply).
///
/// `on_update` is forwarded into [`AcpHandler::prompt`] so streaming chunks
/// can be written to the transport as they're produced, not buffered until
/// the call returns.
pub async fn dispatch(
    handler: &dyn AcpHandler,
    request: JsonRpcRequest,
    on_update: &(dyn Fn(SessionUpdate) + Send + Sync),
) -> Option<JsonRpcResponse> {
    let id = request.id.clone();
    let result = match request.method.as_str() {
        "initialize" => handle_call(request, |p| async move { handler.initialize(p).await }).await,
        "session.new" => handle_call(request, |p| async move { handler.new_session(p).await }).await,
        "session.prompt" => {
            handle_call(request, |p| async move { handler.prompt(p, on_update).await }).await
        }
        "session.cancel" => {
            match parse_params::<CancelParams>(&request) {
                Ok(p) => {
                    handler.cancel(p).await;
                }
                Err(_) => {}
            }
            return None; // notification: never reply, even on parse failure
        }
        other => Err(JsonRpcError::method_not_found(other)),
    };

    let id = match id {
        Some(id) => id,
        None => return None, // malformed call with no id: nothing to reply to
    };
    Some(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(id, e),
    })
}

fn parse_params<T: for<'de> Deserialize<'de>>(req: &JsonRpcRequest) -> Result<T, JsonRpcError> {
    let params = req.params.clone().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

async fn handle_call<P, R, F, Fut>(request: JsonRpcRequest, f: F) -> Result<serde_json::Value, JsonRpcError>
where
    P: for<'de> Deserialize<'de>,
    R: Serialize,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, JsonRpcError>>,
{
    let params = parse_params::<P>(&request)?;
    let result = f(params).await?;
    serde_json::to_value(result).map_err(|e| JsonRpcError::new(-32603, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::duplex;

    struct EchoHandler {
        cancelled: AtomicUsize,
    }

    #[async_trait]
    impl AcpHandler for EchoHandler {
        async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult, JsonRpcError> {
            Ok(InitializeResult {
                protocol_version: params.protocol_version,
                server_name: "test-kernel".to_string(),
                server_version: "0.0.0".to_string(),
                capabilities: ServerCapabilities { streaming: true, tool_calls: true },
            })
        }

        async fn new_session(&self, _params: NewSessionParams) -> Result<NewSessionResult, JsonRpcError> {
            Ok(NewSessionResult { session_id: "sess-1".to_string() })
        }

        async fn prompt(
            &self,
            params: PromptParams,
            on_update: &(dyn Fn(SessionUpdate) + Send + Sync),
        ) -> Result<PromptResult, JsonRpcError> {
            on_update(SessionUpdate::AgentMessageChunk {
                session_id: params.session_id,
                text: "echo".to_string(),
            });
            Ok(PromptResult { stop_reason: StopReason::EndTurn })
        }

        async fn cancel(&self, _params: CancelParams) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn initialize_round_trips_over_duplex_pipe() {
        let (client_io, server_io) = duplex(4096);
        let handler = Arc::new(EchoHandler { cancelled: AtomicUsize::new(0) });
        let (_client_read, mut client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let mut server = AcpStdioTransport::new(server_read, server_write);

        let req = JsonRpcRequest::new(
            "initialize",
            Some(serde_json::to_value(InitializeParams {
                protocol_version: PROTOCOL_VERSION.to_string(),
                client_info: None,
            }).unwrap()),
            JsonRpcId::Number(1),
        );
        client_write.write_all(serde_json::to_string(&req).unwrap().as_bytes()).await.unwrap();
        client_write.write_all(b"\n").await.unwrap();

        let parsed = server.read_request().await.unwrap().unwrap();
        assert_eq!(parsed.method, "initialize");
        let noop = |_u: SessionUpdate| {};
        let resp = dispatch(handler.as_ref(), parsed, &noop).await.unwrap();
        assert!(resp.error.is_none());
        let result: InitializeResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.server_name, "test-kernel");
        assert!(result.capabilities.streaming);
    }

    #[tokio::test]
    async fn oversized_line_is_rejected_by_length() {
        let (client_io, server_io) = duplex(MAX_LINE_LENGTH + 1024);
        let (_client_read, mut client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let mut server = AcpStdioTransport::new(server_read, server_write);

        let huge = "a".repeat(MAX_LINE_LENGTH + 1);
        client_write.write_all(huge.as_bytes()).await.unwrap();
        client_write.write_all(b"\n").await.unwrap();

        let err = server.read_request().await.unwrap_err();
        match err {
            AcpError::LineTooLong { limit, actual } => {
                assert_eq!(limit, MAX_LINE_LENGTH);
                assert!(actual > MAX_LINE_LENGTH);
            }
            other => panic!("expected LineTooLong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_notification_never_produces_a_response() {
        let handler = Arc::new(EchoHandler { cancelled: AtomicUsize::new(0) });
        let req = JsonRpcRequest::notification(
            "session.cancel",
            Some(serde_json::to_value(CancelParams { session_id: "sess-1".to_string() }).unwrap()),
        );
        let noop = |_u: SessionUpdate| {};
        let resp = dispatch(handler.as_ref(), req, &noop).await;
        assert!(resp.is_none());
        assert_eq!(handler.cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_method_gets_method_not_found() {
        let handler = Arc::new(EchoHandler { cancelled: AtomicUsize::new(0) });
        let req = JsonRpcRequest::new("bogus.method", None, JsonRpcId::Number(9));
        let noop = |_u: SessionUpdate| {};
        let resp = dispatch(handler.as_ref(), req, &noop).await.unwrap();
        let err = resp.error.expect("expected error response");
        assert_eq!(err.code, crate::jsonrpc::error_codes::METHOD_NOT_FOUND);
    }
}
