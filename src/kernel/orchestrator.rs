//! The top-level entry point: route → plan → delegate → converge.
//!
//! [`Orchestrator`] is the single object a host application drives. It owns
//! the shared-resource singletons ([`AgentRegistry`], [`CostController`],
//! [`Persistence`], [`PlanDb`]) as explicit `Arc`-wrapped state rather than
//! process globals, and wires them together through [`IntentRouter`] and
//! [`TaskDecomposer`]: a user turn is routed to an addressee, routed turns
//! that ask for decomposition run through the planner and a
//! dependency-ordered delegation executor, and every other turn either
//! answers directly or follows delegation directives embedded in the
//! addressee's own reply. Convergence, the one final call that folds every
//! sub-response back into a single answer, always runs serially through
//! the orchestrator agent (conventionally named "Ali").

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use crate::kernel::agent::Agent;
use crate::kernel::agent_registry::{AgentRegistry, Role as AgentRole};
use crate::kernel::client_wrapper::ClientWrapper;
use crate::kernel::config::KernelConfig;
use crate::kernel::cost_controller::CostController;
use crate::kernel::errors::KernelError;
use crate::kernel::intent_router::{IntentRouter, IntentType};
use crate::kernel::message_bus::MessageBus;
use crate::kernel::persistence::{CostDailyRecord, Persistence};
use crate::kernel::plan_db::PlanDb;
use crate::kernel::provider::ModelRegistry;
use crate::kernel::task_decomposer::{task_get_ready, DecomposedTask, TaskDecomposer};

/// Representative token counts used only to *estimate* the cost of a
/// not-yet-issued delegated call during budget admission. The actual
/// charge, recorded after the call completes, uses the provider's real
/// usage numbers.
const PROJECTED_INPUT_TOKENS: usize = 1_500;
const PROJECTED_OUTPUT_TOKENS: usize = 500;

/// A directive embedded in an agent's reply naming another agent to run a
/// specific subtask. Written as a line of the form
/// `DELEGATE: <agent_id>: <reason>`, deliberately simple text rather than a
/// JSON payload, so a model can emit it inline without switching output
/// modes mid-reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationDirective {
    pub agent_id: String,
    pub reason: String,
}

/// Scan `reply` for `DELEGATE: <agent_id>: <reason>` lines, in the order
/// they appear. That order is also the priority order budget admission
/// drops from the back of when not every delegation fits under budget.
pub fn parse_delegations(reply: &str) -> Vec<DelegationDirective> {
    reply
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let rest = trimmed
                .strip_prefix("DELEGATE:")
                .or_else(|| trimmed.strip_prefix("delegate:"))?;
            let mut parts = rest.splitn(2, ':');
            let agent_id = parts.next()?.trim().to_string();
            let reason = parts.next().unwrap_or("").trim().to_string();
            if agent_id.is_empty() {
                return None;
            }
            Some(DelegationDirective { agent_id, reason })
        })
        .collect()
}

/// Callbacks invoked synchronously on the thread performing the action;
/// consumers must not block within them.
#[derive(Default)]
pub struct OrchestratorCallbacks {
    pub on_message: Option<Box<dyn Fn(&str, &str) + Send + Sync>>,
    pub on_cost_update: Option<Box<dyn Fn(f64) + Send + Sync>>,
    pub on_agent_spawn: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

/// Owns every shared-resource singleton and drives a user turn through
/// route → plan → delegate → converge.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    persistence: Arc<Persistence>,
    plan_db: Arc<PlanDb>,
    cost_controller: Arc<CostController>,
    #[allow(dead_code)] // wired for future bus-backed addressing; not yet on the hot path
    message_bus: Arc<MessageBus>,
    model_registry: Arc<ModelRegistry>,
    router: IntentRouter,
    router_client: Arc<dyn ClientWrapper>,
    decomposer: TaskDecomposer,
    ali_agent_id: String,
    session_id: i64,
    message_count: AtomicI64,
    callbacks: StdMutex<OrchestratorCallbacks>,
}

impl Orchestrator {
    /// Open persistence and the plan database per `config`, seed the cost
    /// controller with `config.budget_limit_usd`, and start a session.
    /// `ali_agent_id` must already be registered in `registry` under
    /// [`AgentRole::Orchestrator`]; it is the agent convergence calls run
    /// against. `router_client` is the cheap model used for intent
    /// classification fallback and task decomposition.
    pub fn init(
        config: &KernelConfig,
        registry: Arc<AgentRegistry>,
        model_registry: Arc<ModelRegistry>,
        ali_agent_id: impl Into<String>,
        router_client: Arc<dyn ClientWrapper>,
    ) -> Result<Self, KernelError> {
        let persistence = Arc::new(Persistence::open(&config.persistence_db_path)?);
        let plan_db = Arc::new(PlanDb::open(&config.plan_db_path)?);
        let cost_controller = Arc::new(CostController::new(config.budget_limit_usd));
        let session_id = persistence.create_session("local")?;

        Ok(Self {
            registry,
            persistence,
            plan_db,
            cost_controller,
            message_bus: Arc::new(MessageBus::new()),
            model_registry,
            router: IntentRouter::new(256),
            decomposer: TaskDecomposer::new(Arc::clone(&router_client)),
            router_client,
            ali_agent_id: ali_agent_id.into(),
            session_id,
            message_count: AtomicI64::new(0),
            callbacks: StdMutex::new(OrchestratorCallbacks::default()),
        })
    }

    pub fn set_on_message(&self, cb: Box<dyn Fn(&str, &str) + Send + Sync>) {
        self.callbacks.lock().unwrap().on_message = Some(cb);
    }

    pub fn set_on_cost_update(&self, cb: Box<dyn Fn(f64) + Send + Sync>) {
        self.callbacks.lock().unwrap().on_cost_update = Some(cb);
    }

    pub fn set_on_agent_spawn(&self, cb: Box<dyn Fn(&str) + Send + Sync>) {
        self.callbacks.lock().unwrap().on_agent_spawn = Some(cb);
    }

    pub fn cost_controller(&self) -> &Arc<CostController> {
        &self.cost_controller
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    fn emit_message(&self, sender: &str, content: &str) {
        if let Some(cb) = &self.callbacks.lock().unwrap().on_message {
            cb(sender, content);
        }
    }

    fn emit_agent_spawn(&self, agent_id: &str) {
        if let Some(cb) = &self.callbacks.lock().unwrap().on_agent_spawn {
            cb(agent_id);
        }
    }

    fn record_usage(&self, agent_id: &str, model_id: &str, tokens: Option<crate::kernel::client_wrapper::TokenUsage>) {
        let Some(tokens) = tokens else { return };
        let Some(model) = self.model_registry.get(model_id) else { return };
        self.cost_controller.record_agent_usage(agent_id, model, tokens.input_tokens, tokens.output_tokens);
        if let Some(cb) = &self.callbacks.lock().unwrap().on_cost_update {
            cb(self.cost_controller.session_spend());
        }
    }

    fn save_message(&self, role: &str, content: &str) {
        self.message_count.fetch_add(1, Ordering::SeqCst);
        // Persistence failures here are not fatal to the turn in progress —
        // the orchestrator logs and keeps serving the user rather than
        // losing an already-computed answer over a write error.
        if let Err(e) = self.persistence.save_message(self.session_id, role, content, None, 0, 0) {
            log::warn!("failed to persist message from {role}: {e}");
        }
    }

    async fn fork_agent(&self, agent_id: &str) -> Option<Agent> {
        self.registry.fork_agent(agent_id).await
    }

    /// The budget-gate + router + plan/delegate/converge pipeline for one
    /// user turn.
    pub async fn process(&self, user_input: &str) -> Result<String, KernelError> {
        self.save_message("user", user_input);
        self.emit_message("user", user_input);

        if self.cost_controller.is_budget_exceeded() {
            let msg = format!(
                "Budget exceeded: session spend ${:.4} has reached the ${:.4} cap. Raise the budget to continue.",
                self.cost_controller.session_spend(),
                self.cost_controller.budget_limit(),
            );
            return Ok(msg);
        }

        let known_ids = self.registry.all_ids().await;
        let decision = self
            .router
            .route(user_input, &known_ids, &self.ali_agent_id, self.router_client.as_ref())
            .await
            .map_err(|e| KernelError::Other(e.to_string()))?;

        let final_text = match decision.intent_type {
            IntentType::Delegate => self.run_decomposition(user_input).await?,
            IntentType::Switch | IntentType::Message => {
                self.run_direct_turn(&decision.target_agent, user_input).await?
            }
        };

        self.save_message("assistant", &final_text);
        self.emit_message(&decision.target_agent, &final_text);
        Ok(final_text)
    }

    /// Fan out directly to `agent_names`, skipping the router, then
    /// converge through the orchestrator agent exactly as a
    /// router-initiated delegation would.
    pub async fn parallel_analyze(&self, input: &str, agent_names: &[String]) -> Result<String, KernelError> {
        let directives: Vec<DelegationDirective> =
            agent_names.iter().map(|id| DelegationDirective { agent_id: id.clone(), reason: String::new() }).collect();
        self.run_delegations(input, "", directives).await
    }

    /// Session + lifetime cost status plus the budget gate, for the host's
    /// `/status` surface.
    pub async fn status(&self) -> String {
        format!(
            "session_spend=${:.4} lifetime_spend=${:.4} budget_limit=${:.4} budget_exceeded={} agents={}",
            self.cost_controller.session_spend(),
            self.cost_controller.lifetime_spend(),
            self.cost_controller.budget_limit(),
            self.cost_controller.is_budget_exceeded(),
            self.registry.len().await,
        )
    }

    /// Drain the day's cost rollups into persistence and close out the
    /// session row.
    pub fn shutdown(&self) -> Result<(), KernelError> {
        for rollup in self.cost_controller.drain_daily_rollups() {
            self.persistence.upsert_cost_daily(&CostDailyRecord {
                date: rollup.date,
                input_tokens: rollup.input_tokens as i64,
                output_tokens: rollup.output_tokens as i64,
                cost: rollup.cost_usd,
                calls: rollup.calls as i64,
            })?;
        }
        self.persistence.end_session(
            self.session_id,
            self.cost_controller.session_spend(),
            self.message_count.load(Ordering::SeqCst),
        )?;
        Ok(())
    }

    async fn run_direct_turn(&self, addressee: &str, input: &str) -> Result<String, KernelError> {
        let mut agent = self
            .fork_agent(addressee)
            .await
            .ok_or_else(|| KernelError::Other(format!("unknown or inactive agent: {addressee}")))?;
        self.emit_agent_spawn(addressee);
        let model_id = agent.client().model_name().to_string();
        let response = agent.send(input).await.map_err(|e| KernelError::Other(e.to_string()))?;
        self.record_usage(addressee, &model_id, response.tokens_used.clone());

        let delegations = parse_delegations(&response.content);
        if delegations.is_empty() {
            return Ok(response.content);
        }
        self.run_delegations(input, &response.content, delegations).await
    }

    /// Filter delegations to known agents, admit under budget, dispatch in
    /// parallel, collect index-stably, persist every leg, then converge.
    async fn run_delegations(
        &self,
        original_input: &str,
        addressee_reply: &str,
        directives: Vec<DelegationDirective>,
    ) -> Result<String, KernelError> {
        let mut admitted = Vec::new();
        for d in directives {
            if self.registry.contains(&d.agent_id).await {
                admitted.push(d);
            }
        }
        if admitted.is_empty() {
            return Ok(addressee_reply.to_string());
        }

        let admitted = self.admit_under_budget(admitted).await;
        if admitted.is_empty() {
            return Ok(format!(
                "{addressee_reply}\n\n(Budget would be exceeded admitting any delegated subtask; none were run.)"
            ));
        }

        let agent_ids: Vec<String> = admitted.iter().map(|d| d.agent_id.clone()).collect();
        let mut model_ids: HashMap<String, String> = HashMap::new();
        for id in &agent_ids {
            if let Some(agent) = self.fork_agent(id).await {
                model_ids.insert(id.clone(), agent.client().model_name().to_string());
            }
            self.emit_agent_spawn(id);
        }

        let prompts: HashMap<String, String> = admitted
            .iter()
            .map(|d| {
                let prompt = if d.reason.is_empty() {
                    original_input.to_string()
                } else {
                    format!("{original_input}\n\nDelegated subtask: {}", d.reason)
                };
                (d.agent_id.clone(), prompt)
            })
            .collect();

        let results = self
            .registry
            .execute_parallel(&agent_ids, move |mut agent, agent_id| {
                let prompt = prompts.get(&agent_id).cloned().unwrap_or_default();
                async move { agent.send(&prompt).await }
            })
            .await;

        let mut sub_responses = Vec::with_capacity(results.len());
        for (idx, entry) in results.into_iter().enumerate() {
            let agent_id = &agent_ids[idx];
            let content = match entry {
                Some((_, _, Ok(resp))) => {
                    if let Some(model_id) = model_ids.get(agent_id) {
                        self.record_usage(agent_id, model_id, resp.tokens_used.clone());
                    }
                    resp.content
                }
                Some((_, _, Err(e))) => format!("[{agent_id} failed: {e}]"),
                None => format!("[{agent_id} inactive]"),
            };
            self.emit_message(agent_id, &content);
            self.save_message(agent_id, &content);
            sub_responses.push((agent_id.clone(), content));
        }

        self.converge(original_input, &sub_responses).await
    }

    /// Drop delegations from the back of the (priority-ordered) list until
    /// the projected cost of the remainder fits under the session budget,
    /// or none are left.
    async fn admit_under_budget(&self, mut candidates: Vec<DelegationDirective>) -> Vec<DelegationDirective> {
        loop {
            let mut projected = 0.0;
            for d in &candidates {
                if let Some(agent) = self.fork_agent(&d.agent_id).await {
                    if let Some(model) = self.model_registry.get(agent.client().model_name()) {
                        projected += model.estimate_cost(PROJECTED_INPUT_TOKENS, PROJECTED_OUTPUT_TOKENS);
                    }
                }
            }
            if candidates.is_empty() || self.cost_controller.session_spend() + projected <= self.cost_controller.budget_limit() {
                return candidates;
            }
            candidates.pop();
        }
    }

    /// The single serial convergence call: Ali folds every sub-response and
    /// the original input into one final answer.
    async fn converge(&self, original_input: &str, sub_responses: &[(String, String)]) -> Result<String, KernelError> {
        let mut ali = self
            .fork_agent(&self.ali_agent_id)
            .await
            .ok_or_else(|| KernelError::Other(format!("orchestrator agent {} is not registered", self.ali_agent_id)))?;

        let mut prompt = format!("Original request: {original_input}\n\nSub-agent responses:\n");
        for (agent_id, content) in sub_responses {
            prompt.push_str(&format!("- {agent_id}: {content}\n"));
        }
        prompt.push_str("\nSynthesize these into one final answer for the user.");

        let model_id = ali.client().model_name().to_string();
        let response = ali.send(&prompt).await.map_err(|e| KernelError::Other(e.to_string()))?;
        self.record_usage(&self.ali_agent_id, &model_id, response.tokens_used.clone());
        Ok(response.content)
    }

    /// Decompose the goal, persist the plan, run each readiness wave in
    /// parallel, then converge over every task's result. Wave computation
    /// (which tasks are unblocked right now) is [`task_get_ready`]'s job,
    /// not this method's — it only resolves agents and dispatches.
    async fn run_decomposition(&self, goal: &str) -> Result<String, KernelError> {
        let tasks = self.decomposer.decompose(goal).await?;
        let plan_id = self.plan_db.create_plan(goal, None)?;

        let mut db_ids: HashMap<usize, i64> = HashMap::new();
        for task in &tasks {
            let db_id = self.plan_db.add_task(plan_id, &task.description, None, 0, None)?;
            db_ids.insert(task.id, db_id);
        }

        let mut completed: HashMap<usize, String> = HashMap::new();
        let mut completed_ids: HashSet<usize> = HashSet::new();
        let in_flight: HashSet<usize> = HashSet::new();

        loop {
            let ready: Vec<&DecomposedTask> = task_get_ready(&tasks, &completed_ids, &in_flight);
            if ready.is_empty() {
                break;
            }

            let mut agent_ids = Vec::with_capacity(ready.len());
            let mut model_ids = Vec::with_capacity(ready.len());
            let mut prompts: HashMap<String, String> = HashMap::new();
            for t in &ready {
                let role = AgentRole::from_str_loose(&t.role);
                let candidates = self.registry.ids_with_role(role).await;
                let chosen = candidates.into_iter().next().unwrap_or_else(|| self.ali_agent_id.clone());
                let model_id = self
                    .fork_agent(&chosen)
                    .await
                    .map(|agent| agent.client().model_name().to_string())
                    .unwrap_or_default();
                let deps_context: String = t
                    .depends_on
                    .iter()
                    .filter_map(|d| completed.get(d))
                    .map(|r| format!("\n[prior result] {r}"))
                    .collect();
                prompts.insert(chosen.clone(), format!("{}{deps_context}", t.description));
                self.emit_agent_spawn(&chosen);
                agent_ids.push(chosen);
                model_ids.push(model_id);
            }

            let results = self
                .registry
                .execute_parallel(&agent_ids, move |mut agent, agent_id| {
                    let prompt = prompts.get(&agent_id).cloned().unwrap_or_default();
                    async move { agent.send(&prompt).await }
                })
                .await;

            for (i, t) in ready.iter().enumerate() {
                let db_id = db_ids[&t.id];
                match &results[i] {
                    Some((agent_id, _, Ok(resp))) => {
                        self.record_usage(agent_id, &model_ids[i], resp.tokens_used.clone());
                        self.plan_db.complete_task(db_id, &resp.content)?;
                        completed.insert(t.id, resp.content.clone());
                    }
                    Some((_, _, Err(e))) => {
                        self.plan_db.fail_task(db_id, e)?;
                        completed.insert(t.id, format!("[task failed: {e}]"));
                    }
                    None => {
                        self.plan_db.fail_task(db_id, "agent inactive")?;
                        completed.insert(t.id, "[agent inactive]".to_string());
                    }
                }
                completed_ids.insert(t.id);
            }
        }
        self.plan_db.refresh_plan_status(plan_id)?;

        let sub_responses: Vec<(String, String)> = tasks
            .iter()
            .map(|t| (t.description.clone(), completed.get(&t.id).cloned().unwrap_or_default()))
            .collect();
        self.converge(goal, &sub_responses).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::agent::Agent;
    use crate::kernel::client_wrapper::{Message, Role, TokenUsage, ToolDefinition};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc as StdArc;

    struct StubClient {
        model: &'static str,
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ClientWrapper for StubClient {
        async fn send_message(
            &self,
            _messages: &[Message],
            _tools: Option<Vec<ToolDefinition>>,
        ) -> Result<Message, Box<dyn Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Message { role: Role::Assistant, content: StdArc::from(self.reply.as_str()), tool_calls: vec![] })
        }

        fn model_name(&self) -> &str {
            self.model
        }

        fn usage_slot(&self) -> Option<&tokio::sync::Mutex<Option<TokenUsage>>> {
            None
        }
    }

    fn stub_model_registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(crate::kernel::provider::ModelInfo {
            id: "stub-model".to_string(),
            display_name: "Stub".to_string(),
            provider_id: "stub".to_string(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 1.0,
            thinking_cost_per_million: None,
            context_window: 8_000,
            max_output_tokens: 1_000,
            supports_tools: false,
            supports_vision: false,
            supports_streaming: false,
            tier: crate::kernel::provider::ModelTier::Economy,
            release_date: None,
            deprecated: false,
        });
        registry
    }

    async fn registry_with_ali_and(extra: &[(&str, AgentRole)]) -> Arc<AgentRegistry> {
        let registry = AgentRegistry::new();
        let ali_client: Arc<dyn ClientWrapper> =
            Arc::new(StubClient { model: "stub-model", reply: "final synthesized answer".to_string(), calls: AtomicUsize::new(0) });
        registry.register(Agent::new("ali", "Ali", ali_client), AgentRole::Orchestrator).await;
        for (id, role) in extra {
            let client: Arc<dyn ClientWrapper> =
                Arc::new(StubClient { model: "stub-model", reply: format!("reply from {id}"), calls: AtomicUsize::new(0) });
            registry.register(Agent::new(*id, *id, client), *role).await;
        }
        Arc::new(registry)
    }

    fn test_config() -> KernelConfig {
        KernelConfig { budget_limit_usd: 100.0, ..KernelConfig::default() }
    }

    #[tokio::test]
    async fn direct_turn_answers_without_delegation() {
        let registry = registry_with_ali_and(&[]).await;
        let router_client: Arc<dyn ClientWrapper> =
            Arc::new(StubClient { model: "stub-model", reply: "message".to_string(), calls: AtomicUsize::new(0) });
        let orchestrator =
            Orchestrator::init(&test_config(), registry, Arc::new(stub_model_registry()), "ali", router_client).unwrap();

        let answer = orchestrator.process("hello there").await.unwrap();
        assert_eq!(answer, "final synthesized answer");
    }

    #[tokio::test]
    async fn parallel_analyze_converges_sub_responses_in_order() {
        let registry = registry_with_ali_and(&[("a", AgentRole::Coder), ("b", AgentRole::Critic)]).await;
        let router_client: Arc<dyn ClientWrapper> =
            Arc::new(StubClient { model: "stub-model", reply: "message".to_string(), calls: AtomicUsize::new(0) });
        let orchestrator =
            Orchestrator::init(&test_config(), registry, Arc::new(stub_model_registry()), "ali", router_client).unwrap();

        let answer = orchestrator
            .parallel_analyze("investigate this", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, "final synthesized answer");
    }

    #[tokio::test]
    async fn delegation_drops_to_budget_when_admission_would_exceed_cap() {
        let registry = registry_with_ali_and(&[("a", AgentRole::Coder), ("b", AgentRole::Critic)]).await;
        let router_client: Arc<dyn ClientWrapper> =
            Arc::new(StubClient { model: "stub-model", reply: "message".to_string(), calls: AtomicUsize::new(0) });
        // Budget only fits one projected call (1_500+500 tokens * $1/M ~= $0.002 each).
        let config = KernelConfig { budget_limit_usd: 0.0025, ..KernelConfig::default() };
        let orchestrator = Orchestrator::init(&config, registry, Arc::new(stub_model_registry()), "ali", router_client).unwrap();

        let directives = vec![
            DelegationDirective { agent_id: "a".to_string(), reason: "research".to_string() },
            DelegationDirective { agent_id: "b".to_string(), reason: "review".to_string() },
        ];
        let admitted = orchestrator.admit_under_budget(directives).await;
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].agent_id, "a");
    }

    #[tokio::test]
    async fn budget_gate_refuses_new_calls_once_exceeded() {
        let registry = registry_with_ali_and(&[]).await;
        let router_client: Arc<dyn ClientWrapper> =
            Arc::new(StubClient { model: "stub-model", reply: "message".to_string(), calls: AtomicUsize::new(0) });
        let config = KernelConfig { budget_limit_usd: 0.0, ..KernelConfig::default() };
        let orchestrator = Orchestrator::init(&config, registry, Arc::new(stub_model_registry()), "ali", router_client).unwrap();
        orchestrator.cost_controller.record_usage(
            orchestrator.model_registry.get("stub-model").unwrap(),
            1,
            1,
        );
        assert!(orchestrator.cost_controller.is_budget_exceeded());

        let answer = orchestrator.process("anything").await.unwrap();
        assert!(answer.contains("Budget exceeded"));
    }

    #[test]
    fn parse_delegations_extracts_agent_and_reason() {
        let reply = "Let's split this up.\nDELEGATE: researcher: look into pricing\nDELEGATE: writer: draft a summary\n";
        let directives = parse_delegations(reply);
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].agent_id, "researcher");
        assert_eq!(directives[0].reason, "look into pricing");
        assert_eq!(directives[1].agent_id, "writer");
    }

    #[tokio::test]
    async fn direct_turn_switches_to_an_explicitly_addressed_agent() {
        let registry = registry_with_ali_and(&[("coder", AgentRole::Coder)]).await;
        let router_client: Arc<dyn ClientWrapper> =
            Arc::new(StubClient { model: "stub-model", reply: "message".to_string(), calls: AtomicUsize::new(0) });
        let orchestrator =
            Orchestrator::init(&test_config(), registry, Arc::new(stub_model_registry()), "ali", router_client).unwrap();

        let answer = orchestrator.process("/coder fix the bug").await.unwrap();
        assert_eq!(answer, "reply from coder");
    }
}
