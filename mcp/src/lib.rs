//! `mcp` — reusable protocol types and transports shared by the orchestration
//! runtime's tool surface and its external agent-client surface.
//!
//! Two protocols live here, both JSON-over-a-wire rather than a bespoke
//! binary format, matching the rest of the workspace's HTTP/JSON lineage:
//!
//! - [`jsonrpc`]: the generic JSON-RPC 2.0 envelope (request, response,
//!   notification, and the error object) that both protocols below build on.
//! - [`tool`]: vendor-neutral tool/resource description types — the shapes
//!   `mcp_server`/`mcp_http_adapter` in the root crate route HTTP tool calls
//!   through.
//! - [`acp`]: the line-delimited JSON-RPC 2.0 "agent-client protocol" surface
//!   (`initialize`, `session.new`, `session.prompt`, `session.cancel`) plus a
//!   stdio transport enforcing the 64KiB max line length.

pub mod acp;
pub mod jsonrpc;
pub mod tool;

pub use acp::{AcpError, AcpStdioTransport};
pub use jsonrpc::{JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
