//! Registry of live agents, keyed by a functional [`Role`] rather than the
//! free-form `expertise` string [`Agent`] itself carries.
//!
//! Wraps each [`Agent`] in a [`ManagedAgent`] that also tracks registration
//! metadata (when it joined, whether it's enabled) without touching the
//! agent's own fields, the same "wrap, don't modify" relationship
//! `orchestration.rs` uses between [`Agent`] and its collaborators.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::kernel::agent::Agent;
use crate::kernel::client_wrapper::ClientWrapper;
use crate::kernel::persistence::{AgentRecord, Persistence};

/// The functional slot an agent fills within an orchestration, distinct
/// from [`Agent::expertise`] (a free-form prompt hint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Orchestrator,
    Analyst,
    Coder,
    Writer,
    Critic,
    Planner,
    Executor,
    Memory,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Orchestrator => "orchestrator",
            Role::Analyst => "analyst",
            Role::Coder => "coder",
            Role::Writer => "writer",
            Role::Critic => "critic",
            Role::Planner => "planner",
            Role::Executor => "executor",
            Role::Memory => "memory",
        };
        write!(f, "{}", s)
    }
}

impl Role {
    /// Maps loose/legacy spellings (`"engineer"`, `"reviewer"`,
    /// `"researcher"`) onto the canonical role set. Unrecognized input
    /// falls back to [`Role::Executor`] rather than a `Custom` catchall —
    /// an agent whose role can't be determined should still be dispatchable
    /// for general work.
    pub fn from_str_loose(s: &str) -> Role {
        match s.to_ascii_lowercase().as_str() {
            "orchestrator" => Role::Orchestrator,
            "analyst" | "researcher" => Role::Analyst,
            "coder" | "engineer" => Role::Coder,
            "writer" => Role::Writer,
            "critic" | "reviewer" => Role::Critic,
            "planner" => Role::Planner,
            "executor" => Role::Executor,
            "memory" => Role::Memory,
            _ => Role::Executor,
        }
    }
}

/// Keyword table used by [`AgentRegistry::select_for_task`] to infer the
/// role a task description calls for. Checked in order; the first matching
/// keyword wins.
const ROLE_KEYWORDS: &[(&str, Role)] = &[
    ("research", Role::Analyst),
    ("analyz", Role::Analyst),
    ("investigat", Role::Analyst),
    ("writ", Role::Writer),
    ("draft", Role::Writer),
    ("document", Role::Writer),
    ("code", Role::Coder),
    ("implement", Role::Coder),
    ("fix", Role::Coder),
    ("build", Role::Coder),
    ("review", Role::Critic),
    ("critiqu", Role::Critic),
    ("audit", Role::Critic),
    ("plan", Role::Planner),
    ("decompos", Role::Planner),
    ("break down", Role::Planner),
    ("remember", Role::Memory),
    ("recall", Role::Memory),
    ("memory", Role::Memory),
    ("execut", Role::Executor),
    ("run", Role::Executor),
    ("perform", Role::Executor),
];

/// On-disk descriptor for hot-reloading agents from a directory of JSON
/// files, one per agent. Mirrors the fields [`Agent`]'s builder accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug)]
pub struct RegistryError {
    pub message: String,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent registry error: {}", self.message)
    }
}

impl Error for RegistryError {}

/// An [`Agent`] plus registry bookkeeping.
pub struct ManagedAgent {
    pub agent: Agent,
    pub role: Role,
    pub registered_at: DateTime<Utc>,
    pub enabled: bool,
}

impl ManagedAgent {
    pub fn new(agent: Agent, role: Role) -> Self {
        Self { agent, role, registered_at: Utc::now(), enabled: true }
    }
}

/// Registry of agents available to an orchestration run, addressable by id
/// or by role.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, ManagedAgent>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { agents: RwLock::new(HashMap::new()) }
    }

    pub async fn register(&self, agent: Agent, role: Role) {
        let id = agent.id.clone();
        self.agents.write().await.insert(id, ManagedAgent::new(agent, role));
    }

    pub async fn unregister(&self, agent_id: &str) -> bool {
        self.agents.write().await.remove(agent_id).is_some()
    }

    pub async fn set_enabled(&self, agent_id: &str, enabled: bool) -> bool {
        if let Some(managed) = self.agents.write().await.get_mut(agent_id) {
            managed.enabled = enabled;
            true
        } else {
            false
        }
    }

    /// Ids of every enabled agent filling `role`, in registration order.
    pub async fn ids_with_role(&self, role: Role) -> Vec<String> {
        let agents = self.agents.read().await;
        let mut matches: Vec<&ManagedAgent> =
            agents.values().filter(|m| m.role == role && m.enabled).collect();
        matches.sort_by_key(|m| m.registered_at);
        matches.into_iter().map(|m| m.agent.id.clone()).collect()
    }

    pub async fn contains(&self, agent_id: &str) -> bool {
        self.agents.read().await.contains_key(agent_id)
    }

    /// Ids of every enabled agent, in registration order. Used by the
    /// orchestrator's addressee resolution, which needs the full roster
    /// rather than one role at a time.
    pub async fn all_ids(&self) -> Vec<String> {
        let agents = self.agents.read().await;
        let mut matches: Vec<&ManagedAgent> = agents.values().filter(|m| m.enabled).collect();
        matches.sort_by_key(|m| m.registered_at);
        matches.into_iter().map(|m| m.agent.id.clone()).collect()
    }

    /// Pick up to `k` enabled agent ids suited to `description`, inferring a
    /// role from [`ROLE_KEYWORDS`] and falling back to [`Role::Executor`]
    /// when nothing matches. Used by the task decomposer to assign agents
    /// to tasks it didn't get an explicit role for.
    pub async fn select_for_task(&self, description: &str, k: usize) -> Vec<String> {
        let lower = description.to_ascii_lowercase();
        let role = ROLE_KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, role)| *role)
            .unwrap_or(Role::Executor);
        let mut ids = self.ids_with_role(role).await;
        ids.truncate(k.max(1));
        ids
    }

    /// Fork a single enabled agent by id, for callers that need to drive one
    /// agent directly (e.g. a direct-message turn or a convergence call)
    /// rather than going through [`execute_parallel`](Self::execute_parallel).
    pub async fn fork_agent(&self, agent_id: &str) -> Option<Agent> {
        let agents = self.agents.read().await;
        let managed = agents.get(agent_id)?;
        if !managed.enabled {
            return None;
        }
        Some(managed.agent.fork())
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fork every enabled agent named in `agent_ids` and run `body` against
    /// each forked agent concurrently, preserving the input order in the
    /// result vector regardless of completion order — the same convention
    /// `Orchestration::execute_parallel` uses for its round results.
    pub async fn execute_parallel<F, Fut>(
        &self,
        agent_ids: &[String],
        body: F,
    ) -> Vec<Option<(String, String, Result<crate::kernel::agent::AgentResponse, String>)>>
    where
        F: Fn(Agent, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<crate::kernel::agent::AgentResponse, Box<dyn Error + Send + Sync>>>
            + Send
            + 'static,
    {
        let body = Arc::new(body);
        let mut forks = Vec::with_capacity(agent_ids.len());
        {
            let agents = self.agents.read().await;
            for agent_id in agent_ids {
                if let Some(managed) = agents.get(agent_id) {
                    if managed.enabled {
                        forks.push(Some((managed.agent.fork(), managed.agent.name.clone())));
                        continue;
                    }
                }
                forks.push(None);
            }
        }

        let mut tasks = Vec::with_capacity(forks.len());
        for (idx, entry) in forks.into_iter().enumerate() {
            match entry {
                Some((forked, name)) => {
                    let body = Arc::clone(&body);
                    let agent_id = agent_ids[idx].clone();
                    tasks.push(Some(tokio::spawn(async move {
                        let result = body(forked, agent_id.clone()).await.map_err(|e| e.to_string());
                        (agent_id, name, result)
                    })));
                }
                None => tasks.push(None),
            }
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task {
                Some(handle) => match handle.await {
                    Ok(outcome) => results.push(Some(outcome)),
                    Err(join_err) => results.push(Some((
                        agent_ids[results.len()].clone(),
                        String::new(),
                        Err(join_err.to_string()),
                    ))),
                },
                None => results.push(None),
            }
        }
        results
    }

    /// Load agent definitions from every `*.json` file in `dir`, creating
    /// each via [`Agent::new`] against `client` and registering it. Every
    /// loaded definition is also mirrored to `persistence` via
    /// [`Persistence::upsert_agent`] so the roster survives a restart; a
    /// persistence failure is logged and otherwise ignored, the same
    /// warn-and-continue convention `Orchestrator::save_message` uses.
    /// Returns the ids of agents (re)loaded. Existing registrations for the
    /// same id are replaced, so calling this again after editing a file
    /// hot-reloads it without restarting the process.
    pub async fn load_directory(
        &self,
        dir: impl AsRef<Path>,
        client: Arc<dyn ClientWrapper>,
        persistence: &Persistence,
    ) -> Result<Vec<String>, RegistryError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| RegistryError { message: format!("reading {}: {}", dir.display(), e) })?;

        let mut loaded = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RegistryError { message: e.to_string() })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| RegistryError { message: format!("reading {}: {}", path.display(), e) })?;
            let def: AgentDefinition = serde_json::from_str(&contents)
                .map_err(|e| RegistryError { message: format!("parsing {}: {}", path.display(), e) })?;

            let mut agent = Agent::new(def.id.clone(), def.name.clone(), client.clone());
            if let Some(expertise) = &def.expertise {
                agent = agent.with_expertise(expertise.clone());
            }
            if let Some(personality) = &def.personality {
                agent = agent.with_personality(personality.clone());
            }
            for (k, v) in def.metadata.clone() {
                agent = agent.with_metadata(k, v);
            }

            let system_prompt = match (&def.expertise, &def.personality) {
                (Some(e), Some(p)) => format!("Expertise: {e}\nPersonality: {p}"),
                (Some(e), None) => format!("Expertise: {e}"),
                (None, Some(p)) => format!("Personality: {p}"),
                (None, None) => String::new(),
            };
            let record = AgentRecord {
                name: def.id.clone(),
                role: def.role.to_string(),
                system_prompt,
                context: None,
                color: None,
                tools_json: "[]".to_string(),
            };
            if let Err(e) = persistence.upsert_agent(&record) {
                log::warn!("failed to persist agent {}: {e}", def.id);
            }

            self.register(agent, def.role).await;
            loaded.push(def.id);
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::client_wrapper::{ClientWrapper, Message, Role as ClientRole, ToolDefinition};
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl ClientWrapper for StubClient {
        async fn send_message(
            &self,
            _messages: &[Message],
            _tools: Option<Vec<ToolDefinition>>,
        ) -> Result<Message, Box<dyn Error>> {
            Ok(Message { role: ClientRole::Assistant, content: Arc::from("ok"), tool_calls: vec![] })
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn register_and_lookup_by_role() {
        let registry = AgentRegistry::new();
        let client: Arc<dyn ClientWrapper> = Arc::new(StubClient);
        registry.register(Agent::new("cod-1", "Coder One", client.clone()), Role::Coder).await;
        registry.register(Agent::new("crit-1", "Critic One", client), Role::Critic).await;

        let coders = registry.ids_with_role(Role::Coder).await;
        assert_eq!(coders, vec!["cod-1".to_string()]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn disabled_agents_are_excluded_from_role_lookup() {
        let registry = AgentRegistry::new();
        let client: Arc<dyn ClientWrapper> = Arc::new(StubClient);
        registry.register(Agent::new("cod-1", "Coder One", client), Role::Coder).await;
        registry.set_enabled("cod-1", false).await;

        assert!(registry.ids_with_role(Role::Coder).await.is_empty());
    }

    #[tokio::test]
    async fn execute_parallel_preserves_input_order() {
        let registry = AgentRegistry::new();
        let client: Arc<dyn ClientWrapper> = Arc::new(StubClient);
        registry.register(Agent::new("a", "A", client.clone()), Role::Coder).await;
        registry.register(Agent::new("b", "B", client), Role::Coder).await;

        let ids = vec!["a".to_string(), "b".to_string()];
        let results = registry
            .execute_parallel(&ids, |mut agent, id| async move {
                let reply = agent.send(&format!("hello from {}", id)).await?;
                Ok(reply)
            })
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().0, "a");
        assert_eq!(results[1].as_ref().unwrap().0, "b");
    }

    #[tokio::test]
    async fn all_ids_excludes_disabled_agents() {
        let registry = AgentRegistry::new();
        let client: Arc<dyn ClientWrapper> = Arc::new(StubClient);
        registry.register(Agent::new("a", "A", client.clone()), Role::Coder).await;
        registry.register(Agent::new("b", "B", client), Role::Critic).await;
        registry.set_enabled("b", false).await;

        assert_eq!(registry.all_ids().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn fork_agent_returns_none_for_unknown_or_disabled() {
        let registry = AgentRegistry::new();
        let client: Arc<dyn ClientWrapper> = Arc::new(StubClient);
        registry.register(Agent::new("a", "A", client), Role::Coder).await;

        assert!(registry.fork_agent("a").await.is_some());
        assert!(registry.fork_agent("missing").await.is_none());

        registry.set_enabled("a", false).await;
        assert!(registry.fork_agent("a").await.is_none());
    }

    #[tokio::test]
    async fn select_for_task_infers_role_from_keywords() {
        let registry = AgentRegistry::new();
        let client: Arc<dyn ClientWrapper> = Arc::new(StubClient);
        registry.register(Agent::new("cod-1", "Coder One", client.clone()), Role::Coder).await;
        registry.register(Agent::new("crit-1", "Critic One", client), Role::Critic).await;

        let picked = registry.select_for_task("review the pull request", 5).await;
        assert_eq!(picked, vec!["crit-1".to_string()]);
    }
}
