// src/lib.rs

//! `ali-kernel` — a terminal-resident, multi-agent LLM orchestration runtime.
//!
//! A chief-of-staff agent ("Ali") interprets a user's natural-language turn, optionally
//! decomposes it into a task graph, dispatches subtasks to specialist agents over one or
//! more LLM providers under a monetary budget, and persists conversation history, plans,
//! and a semantic memory graph across sessions. This crate is the orchestration and
//! execution runtime; line-editing, theming, and config-file loading are left to the host
//! application.

pub mod kernel;

// Whole-module re-exports so internal code can address these by the short
// `crate::client_wrapper::...` paths, without every call site spelling out
// `crate::kernel::...`.
pub use kernel::client_wrapper;
pub use kernel::clients;
pub use kernel::config;
pub use kernel::context_strategy;
pub use kernel::council;
pub use kernel::event;
pub use kernel::multi_participant_session;
pub use kernel::orchestration;
pub use kernel::planner;
pub use kernel::thought_chain;
pub use kernel::tool_adapters;
pub use kernel::tool_protocol;
pub use kernel::tool_protocols;
pub use kernel::tools;

// Re-exports for ergonomic top-level access.
pub use kernel::agent::{Agent, AgentResponse};
pub use kernel::agent_client_protocol::OrchestratorAcpHandler;
pub use kernel::agent_registry::{AgentRegistry, ManagedAgent, Role as AgentRole};
pub use kernel::client_wrapper::{ClientWrapper, Message, Role};
pub use kernel::config::KernelConfig;
pub use kernel::cost_controller::CostController;
pub use kernel::errors::KernelError;
pub use kernel::llm_session::LLMSession;
pub use kernel::orchestrator::Orchestrator;
pub use kernel::persistence::Persistence;
pub use kernel::plan_db::PlanDb;

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Initialize the global `env_logger` once per process.
///
/// Safe to call multiple times (e.g. at the top of every test) — only the
/// first call takes effect. Honors `RUST_LOG` as usual; defaults to `warn`
/// when unset.
pub fn init_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .is_test(false)
            .try_init();
    });
}
