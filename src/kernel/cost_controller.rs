//! Process-wide monetary budget ledger.
//!
//! [`CostController`] is the single place that tracks how much a session (and
//! the process lifetime) has spent against a configured budget. Every
//! provider call that reports [`TokenUsage`](crate::client_wrapper::TokenUsage)
//! should route through [`CostController::record_usage`] (or
//! [`CostController::record_agent_usage`] when the call is attributable to a
//! specific agent) so that [`Orchestrator`](crate::kernel::orchestrator::Orchestrator)
//! can gate further calls once the budget is exceeded.
//!
//! This is an explicit state object meant to be shared via `Arc`, not a
//! language-level global — callers construct one and thread it through the
//! components that need to record or check spend.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::kernel::provider::ModelInfo;

/// A single day's aggregated usage, upserted into the `cost_daily`
/// persistence table at session end or shutdown (see
/// [`crate::kernel::persistence::Persistence::upsert_cost_daily`]).
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRollup {
    /// Calendar date in `YYYY-MM-DD` form.
    pub date: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub cost_usd: f64,
    pub calls: usize,
}

#[derive(Debug, Clone, Default)]
struct AgentAccumulator {
    input_tokens: usize,
    output_tokens: usize,
    cost_usd: f64,
    calls: usize,
}

struct CostState {
    session_spend_usd: f64,
    lifetime_spend_usd: f64,
    session_input_tokens: usize,
    session_output_tokens: usize,
    lifetime_input_tokens: usize,
    lifetime_output_tokens: usize,
    budget_exceeded: bool,
    session_start: DateTime<Utc>,
    per_agent: HashMap<String, AgentAccumulator>,
    daily: HashMap<String, DailyRollup>,
}

/// Monotonic spend ledger guarded by a single mutex.
///
/// Monotonicity invariant: `session_spend()` and `lifetime_spend()` never
/// decrease across the life of the controller. `budget_exceeded` is sticky
/// once set — only [`CostController::clear_budget_exceeded`] (an explicit
/// user action, e.g. raising the budget) resets it.
pub struct CostController {
    budget_limit_usd: Mutex<f64>,
    state: Mutex<CostState>,
}

impl CostController {
    /// Create a controller with the given budget cap, in USD.
    pub fn new(budget_limit_usd: f64) -> Self {
        Self {
            budget_limit_usd: Mutex::new(budget_limit_usd),
            state: Mutex::new(CostState {
                session_spend_usd: 0.0,
                lifetime_spend_usd: 0.0,
                session_input_tokens: 0,
                session_output_tokens: 0,
                lifetime_input_tokens: 0,
                lifetime_output_tokens: 0,
                budget_exceeded: false,
                session_start: Utc::now(),
                per_agent: HashMap::new(),
                daily: HashMap::new(),
            }),
        }
    }

    /// Record usage from a provider call, pricing it against `model`.
    ///
    /// Updates both session and lifetime counters and checks the budget
    /// gate. Returns the incremental cost in USD.
    pub fn record_usage(&self, model: &ModelInfo, input_tokens: usize, output_tokens: usize) -> f64 {
        let cost = model.estimate_cost(input_tokens, output_tokens);
        let mut state = self.state.lock().unwrap();
        state.session_spend_usd += cost;
        state.lifetime_spend_usd += cost;
        state.session_input_tokens += input_tokens;
        state.session_output_tokens += output_tokens;
        state.lifetime_input_tokens += input_tokens;
        state.lifetime_output_tokens += output_tokens;

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let rollup = state.daily.entry(date.clone()).or_insert_with(|| DailyRollup {
            date,
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            calls: 0,
        });
        rollup.input_tokens += input_tokens;
        rollup.output_tokens += output_tokens;
        rollup.cost_usd += cost;
        rollup.calls += 1;

        drop(state);
        self.check_budget();
        cost
    }

    /// Record usage attributable to a specific agent, crediting both the
    /// global ledger (via [`record_usage`](Self::record_usage)) and the
    /// agent's own accumulator.
    pub fn record_agent_usage(
        &self,
        agent_id: &str,
        model: &ModelInfo,
        input_tokens: usize,
        output_tokens: usize,
    ) -> f64 {
        let cost = self.record_usage(model, input_tokens, output_tokens);
        let mut state = self.state.lock().unwrap();
        let acc = state.per_agent.entry(agent_id.to_string()).or_default();
        acc.input_tokens += input_tokens;
        acc.output_tokens += output_tokens;
        acc.cost_usd += cost;
        acc.calls += 1;
        cost
    }

    /// Whether `est_turns` additional calls averaging `avg_input_tokens` /
    /// `avg_output_tokens` tokens, priced against `model`, would fit under
    /// the remaining budget without exceeding it.
    pub fn can_afford(
        &self,
        model: &ModelInfo,
        est_turns: usize,
        avg_input_tokens: usize,
        avg_output_tokens: usize,
    ) -> bool {
        let projected = model.estimate_cost(avg_input_tokens, avg_output_tokens) * est_turns as f64;
        let state = self.state.lock().unwrap();
        let limit = *self.budget_limit_usd.lock().unwrap();
        state.session_spend_usd + projected <= limit
    }

    /// Re-check the budget gate, flipping `budget_exceeded` to `true` once
    /// session spend crosses the limit. Returns `true` while the session is
    /// still within budget (i.e. new calls may proceed).
    pub fn check_budget(&self) -> bool {
        let limit = *self.budget_limit_usd.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        if state.session_spend_usd > limit {
            state.budget_exceeded = true;
        }
        !state.budget_exceeded
    }

    /// Whether the budget-exceeded gate is currently set.
    pub fn is_budget_exceeded(&self) -> bool {
        self.state.lock().unwrap().budget_exceeded
    }

    /// Clear the budget-exceeded flag. Intended for interactive use (the
    /// host UI raising the limit and explicitly resuming).
    pub fn clear_budget_exceeded(&self) {
        self.state.lock().unwrap().budget_exceeded = false;
    }

    /// Raise (or lower) the budget cap. Does not itself clear
    /// `budget_exceeded` — callers that want calls to resume immediately
    /// should also call [`clear_budget_exceeded`](Self::clear_budget_exceeded).
    pub fn set_budget_limit(&self, new_limit_usd: f64) {
        *self.budget_limit_usd.lock().unwrap() = new_limit_usd;
    }

    pub fn budget_limit(&self) -> f64 {
        *self.budget_limit_usd.lock().unwrap()
    }

    pub fn session_spend(&self) -> f64 {
        self.state.lock().unwrap().session_spend_usd
    }

    pub fn lifetime_spend(&self) -> f64 {
        self.state.lock().unwrap().lifetime_spend_usd
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().session_start
    }

    /// The `k` agents with the largest cumulative cost, descending.
    pub fn top_agents(&self, k: usize) -> Vec<(String, f64)> {
        let state = self.state.lock().unwrap();
        let mut agents: Vec<(String, f64)> = state
            .per_agent
            .iter()
            .map(|(id, acc)| (id.clone(), acc.cost_usd))
            .collect();
        agents.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        agents.truncate(k);
        agents
    }

    /// Cumulative cost attributed to a single agent, `0.0` if it has never
    /// been recorded.
    pub fn agent_spend(&self, agent_id: &str) -> f64 {
        self.state
            .lock()
            .unwrap()
            .per_agent
            .get(agent_id)
            .map(|acc| acc.cost_usd)
            .unwrap_or(0.0)
    }

    /// Snapshot of today's daily rollup, for tests and status displays.
    /// Callers that need to persist rollups should use
    /// [`Self::drain_daily_rollups`] at session end or shutdown.
    pub fn daily_rollups(&self) -> Vec<DailyRollup> {
        self.state.lock().unwrap().daily.values().cloned().collect()
    }

    /// Take the accumulated daily rollups, clearing the in-memory set. Called
    /// by the orchestrator at session end so each rollup is upserted into
    /// persistence exactly once.
    pub fn drain_daily_rollups(&self) -> Vec<DailyRollup> {
        let mut state = self.state.lock().unwrap();
        state.daily.drain().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::provider::ModelTier;

    fn cheap_model() -> ModelInfo {
        ModelInfo {
            id: "stub".to_string(),
            display_name: "Stub".to_string(),
            provider_id: "stub".to_string(),
            input_cost_per_million: 1_000_000.0 * 0.006 / 2.0,
            output_cost_per_million: 1_000_000.0 * 0.006 / 2.0,
            thinking_cost_per_million: None,
            context_window: 8_000,
            max_output_tokens: 1_000,
            supports_tools: false,
            supports_vision: false,
            supports_streaming: false,
            tier: ModelTier::Economy,
            release_date: None,
            deprecated: false,
        }
    }

    #[test]
    fn budget_stop_scenario() {
        // budget=0.01, each call charges 0.006.
        let controller = CostController::new(0.01);
        let model = cheap_model();

        controller.record_usage(&model, 1, 1);
        assert!((controller.session_spend() - 0.006).abs() < 1e-9);
        assert!(controller.check_budget());

        controller.record_usage(&model, 1, 1);
        assert!((controller.session_spend() - 0.012).abs() < 1e-9);
        assert!(!controller.check_budget());
        assert!(controller.is_budget_exceeded());
    }

    #[test]
    fn spend_is_monotonic_across_interleaved_calls() {
        let controller = CostController::new(1_000.0);
        let model = cheap_model();
        let mut last = 0.0;
        for i in 0..20 {
            controller.record_agent_usage(&format!("agent-{}", i % 3), &model, 10, 10);
            let spend = controller.session_spend();
            assert!(spend >= last);
            last = spend;
        }
        let per_agent_sum: f64 = (0..3).map(|i| controller.agent_spend(&format!("agent-{}", i))).sum();
        assert!((per_agent_sum - controller.session_spend()).abs() < 1e-6);
    }

    #[test]
    fn budget_exceeded_is_sticky_until_cleared() {
        let controller = CostController::new(0.001);
        let model = cheap_model();
        controller.record_usage(&model, 100, 100);
        assert!(controller.is_budget_exceeded());
        controller.set_budget_limit(1000.0);
        assert!(controller.is_budget_exceeded());
        controller.clear_budget_exceeded();
        assert!(!controller.is_budget_exceeded());
    }

    #[test]
    fn top_agents_ranks_by_cost_descending() {
        let controller = CostController::new(1_000.0);
        let model = cheap_model();
        controller.record_agent_usage("a", &model, 1, 1);
        controller.record_agent_usage("b", &model, 100, 100);
        controller.record_agent_usage("c", &model, 10, 10);

        let top2 = controller.top_agents(2);
        assert_eq!(top2[0].0, "b");
        assert_eq!(top2[1].0, "c");
    }

    #[test]
    fn can_afford_respects_projected_cost() {
        let controller = CostController::new(0.02);
        let model = cheap_model();
        controller.record_usage(&model, 1, 1); // 0.006 spent
        assert!(controller.can_afford(&model, 2, 1, 1)); // +0.012 = 0.018 <= 0.02
        assert!(!controller.can_afford(&model, 3, 1, 1)); // +0.018 = 0.024 > 0.02
    }
}
