//! Shared error taxonomy for the orchestration runtime.
//!
//! Every component-specific error enum (provider, persistence, plan DB,
//! file lock, decomposition) implements `std::error::Error` + `Display` on
//! its own, matching the rest of the kernel lineage. [`KernelError`] is the
//! umbrella type callers of the top-level [`Orchestrator`](crate::Orchestrator)
//! see; it wraps each component error via `From` so `?` composes across
//! module boundaries without an `anyhow`/`thiserror` dependency.

use std::error::Error;
use std::fmt;

use crate::kernel::file_lock::LockError;
use crate::kernel::persistence::PersistenceError;
use crate::kernel::plan_db::PlanDbError;
use crate::kernel::provider::ProviderError;
use crate::kernel::task_decomposer::DecomposeError;

/// Umbrella error returned by the orchestrator and other top-level entry points.
#[derive(Debug)]
pub enum KernelError {
    /// A provider call failed (auth, rate limit, timeout, etc).
    Provider(ProviderError),
    /// A SQLite-backed persistence operation failed.
    Persistence(PersistenceError),
    /// A plan database operation failed.
    PlanDb(PlanDbError),
    /// A file-lock acquisition or release failed.
    Lock(LockError),
    /// Task decomposition produced an invalid graph.
    Decompose(DecomposeError),
    /// The monetary budget would be exceeded by the requested operation.
    BudgetExceeded { requested_usd: f64, remaining_usd: f64 },
    /// Catch-all for conditions that don't fit an existing component error.
    Other(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Provider(e) => write!(f, "provider error: {}", e),
            KernelError::Persistence(e) => write!(f, "persistence error: {}", e),
            KernelError::PlanDb(e) => write!(f, "plan db error: {}", e),
            KernelError::Lock(e) => write!(f, "lock error: {}", e),
            KernelError::Decompose(e) => write!(f, "decomposition error: {}", e),
            KernelError::BudgetExceeded { requested_usd, remaining_usd } => write!(
                f,
                "budget exceeded: requested ${:.4}, only ${:.4} remaining",
                requested_usd, remaining_usd
            ),
            KernelError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for KernelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            KernelError::Provider(e) => Some(e),
            KernelError::Persistence(e) => Some(e),
            KernelError::PlanDb(e) => Some(e),
            KernelError::Lock(e) => Some(e),
            KernelError::Decompose(e) => Some(e),
            KernelError::BudgetExceeded { .. } | KernelError::Other(_) => None,
        }
    }
}

impl From<ProviderError> for KernelError {
    fn from(e: ProviderError) -> Self {
        KernelError::Provider(e)
    }
}

impl From<PersistenceError> for KernelError {
    fn from(e: PersistenceError) -> Self {
        KernelError::Persistence(e)
    }
}

impl From<PlanDbError> for KernelError {
    fn from(e: PlanDbError) -> Self {
        KernelError::PlanDb(e)
    }
}

impl From<LockError> for KernelError {
    fn from(e: LockError) -> Self {
        KernelError::Lock(e)
    }
}

impl From<DecomposeError> for KernelError {
    fn from(e: DecomposeError) -> Self {
        KernelError::Decompose(e)
    }
}
