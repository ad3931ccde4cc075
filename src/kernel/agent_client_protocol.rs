//! Wires [`Orchestrator`] up as an [`AcpHandler`][mcp::acp::AcpHandler], so a
//! host application can expose the runtime over the line-delimited
//! JSON-RPC 2.0 "agent-client protocol" from spec.md §6 instead of (or in
//! addition to) an in-process call.
//!
//! The runtime is a single-process, single-user kernel (spec.md §1's
//! non-goals explicitly rule out cross-host clustering), so `session.new`
//! doesn't spin up a second orchestrator — it mints a session id that
//! `session.prompt`/`session.cancel` validate against, while every prompt
//! still runs through the one [`Orchestrator`] this handler was built with.
//! A host that wants genuinely independent sessions runs one kernel process
//! per session, matching the process-singleton shared-resource design in
//! spec.md §5.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use mcp::acp::{
    AcpHandler, CancelParams, InitializeParams, InitializeResult, NewSessionParams,
    NewSessionResult, PromptParams, PromptResult, ServerCapabilities, SessionUpdate, StopReason,
    PROTOCOL_VERSION,
};
use mcp::jsonrpc::JsonRpcError;

use crate::kernel::orchestrator::Orchestrator;

/// Adapts one [`Orchestrator`] to the [`AcpHandler`] seam.
pub struct OrchestratorAcpHandler {
    orchestrator: Orchestrator,
    next_session_seq: AtomicU64,
    active_session_id: StdMutex<Option<String>>,
    cancel_requested: AtomicBool,
}

impl OrchestratorAcpHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            next_session_seq: AtomicU64::new(1),
            active_session_id: StdMutex::new(None),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl AcpHandler for OrchestratorAcpHandler {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult, JsonRpcError> {
        if params.protocol_version != PROTOCOL_VERSION {
            log::warn!(
                "ACP client requested protocol_version {} but this kernel speaks {}",
                params.protocol_version,
                PROTOCOL_VERSION
            );
        }
        Ok(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_name: "ali-kernel".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: ServerCapabilities { streaming: true, tool_calls: true },
        })
    }

    async fn new_session(&self, _params: NewSessionParams) -> Result<NewSessionResult, JsonRpcError> {
        let seq = self.next_session_seq.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("session-{seq}");
        *self.active_session_id.lock().unwrap() = Some(session_id.clone());
        self.cancel_requested.store(false, Ordering::SeqCst);
        Ok(NewSessionResult { session_id })
    }

    async fn prompt(
        &self,
        params: PromptParams,
        on_update: &(dyn Fn(SessionUpdate) + Send + Sync),
    ) -> Result<PromptResult, JsonRpcError> {
        let active = self.active_session_id.lock().unwrap().clone();
        if active.as_deref() != Some(params.session_id.as_str()) {
            return Err(JsonRpcError::invalid_params(format!(
                "unknown or stale session_id: {}",
                params.session_id
            )));
        }

        self.cancel_requested.store(false, Ordering::SeqCst);

        let result = self.orchestrator.process(&params.text).await;
        if self.cancel_requested.load(Ordering::SeqCst) {
            return Ok(PromptResult { stop_reason: StopReason::Cancelled });
        }

        match result {
            Ok(text) => {
                on_update(SessionUpdate::AgentMessageChunk {
                    session_id: params.session_id.clone(),
                    text,
                });
                on_update(SessionUpdate::CostUpdate {
                    session_id: params.session_id,
                    session_spend_usd: self.orchestrator.cost_controller().session_spend(),
                });
                let stop_reason = if self.orchestrator.cost_controller().is_budget_exceeded() {
                    StopReason::BudgetExceeded
                } else {
                    StopReason::EndTurn
                };
                Ok(PromptResult { stop_reason })
            }
            Err(e) => Err(JsonRpcError::server_error(1, e.to_string())),
        }
    }

    async fn cancel(&self, params: CancelParams) {
        let active = self.active_session_id.lock().unwrap().clone();
        if active.as_deref() == Some(params.session_id.as_str()) {
            self.cancel_requested.store(true, Ordering::SeqCst);
        }
    }
}
