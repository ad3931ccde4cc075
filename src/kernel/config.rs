//! Configuration for the kernel.
//!
//! Provides the [`KernelConfig`] struct used to wire up persistence paths, the
//! monetary budget, compaction thresholds, provider credentials, and the
//! semantic fabric's shard count. Users construct this manually — no TOML,
//! YAML, or other config-file parsing dependency is introduced here; loading
//! from disk and merging with environment/CLI overrides is left to the host
//! application.
//!
//! # Example
//!
//! ```rust
//! use ali_kernel::config::KernelConfig;
//! use std::collections::HashMap;
//! use std::path::PathBuf;
//!
//! let mut credentials = HashMap::new();
//! credentials.insert("openai".to_string(), "sk-...".to_string());
//!
//! let config = KernelConfig {
//!     provider_credentials: credentials,
//!     ..KernelConfig::default()
//! };
//! assert_eq!(config.fabric_shard_count, 16);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

/// Global configuration for the kernel's runtime components.
///
/// This struct is intentionally minimal and users construct it however they
/// want — by hand, from environment variables, or from a config file parsed
/// by the host application. No parsing dependencies are introduced here.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Directory where [`ThoughtChain`](crate::thought_chain::ThoughtChain)
    /// `.jsonl` files are stored, passed to
    /// [`ThoughtChain::open`](crate::thought_chain::ThoughtChain::open) as
    /// the `chain_dir` argument.
    pub thought_chain_dir: PathBuf,
    /// Path to the conversation/cost/plan SQLite database opened by
    /// [`Persistence::open`](crate::kernel::persistence::Persistence::open).
    pub persistence_db_path: PathBuf,
    /// Path to the plan SQLite database opened by
    /// [`PlanDb::open`](crate::kernel::plan_db::PlanDb::open). May point at
    /// the same file as `persistence_db_path`; kept separate by default so a
    /// host can place the plan DB on different storage.
    pub plan_db_path: PathBuf,
    /// Maximum spend, in USD, the [`CostController`](crate::CostController)
    /// will admit before rejecting further delegated calls.
    pub budget_limit_usd: f64,
    /// Token count at which the context compactor triggers a checkpoint.
    pub compaction_token_threshold: usize,
    /// Maximum number of checkpoints retained per session before the two
    /// oldest are merged.
    pub compaction_max_checkpoints: usize,
    /// Already-resolved provider credentials keyed by provider id (e.g.
    /// `"openai"`, `"anthropic"`, `"gemini"`, `"grok"`). Looking these up
    /// from environment variables or a keychain is an external concern.
    pub provider_credentials: HashMap<String, String>,
    /// Number of shards backing the semantic fabric's node store. Must be a
    /// power of two.
    pub fabric_shard_count: usize,
}

/// Reconfigure the global logger's filter level at runtime.
///
/// Backs the external REPL's `/debug <level>` command (spec.md §6). Accepts
/// the six levels spec.md names (`none, error, warn, info, debug, trace`);
/// `none` maps to [`log::LevelFilter::Off`]. Unrecognized input is a no-op —
/// the caller is expected to validate before calling this.
pub fn set_log_level(level: &str) {
    let filter = match level.to_ascii_lowercase().as_str() {
        "none" => log::LevelFilter::Off,
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => return,
    };
    log::set_max_level(filter);
}

impl Default for KernelConfig {
    /// Create a config pointing at `"thought_chains"` and `kernel.sqlite3` in
    /// the current working directory, a $10 default budget, a 6,000-token
    /// compaction threshold, five retained checkpoints, no provider
    /// credentials, and 16 fabric shards.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ali_kernel::config::KernelConfig;
    /// use std::path::PathBuf;
    ///
    /// let config = KernelConfig::default();
    /// assert_eq!(config.thought_chain_dir, PathBuf::from("thought_chains"));
    /// ```
    fn default() -> Self {
        Self {
            thought_chain_dir: PathBuf::from("thought_chains"),
            persistence_db_path: PathBuf::from("kernel.sqlite3"),
            plan_db_path: PathBuf::from("kernel_plan.sqlite3"),
            budget_limit_usd: 10.0,
            compaction_token_threshold: 6_000,
            compaction_max_checkpoints: 5,
            provider_credentials: HashMap::new(),
            fabric_shard_count: 16,
        }
    }
}
