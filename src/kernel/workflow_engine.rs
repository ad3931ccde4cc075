//! User-defined DAG runner for explicit multi-step state machines.
//!
//! Complements the [`Orchestrator`](crate::kernel::orchestrator::Orchestrator)'s
//! implicit route/decompose/delegate/converge flow with an explicit one: a
//! caller builds a [`Workflow`] out of named [`WorkflowNode`]s ahead of time
//! and [`WorkflowEngine`] walks it node by node, persisting a JSON
//! [`WorkflowCheckpoint`] after every step so a paused or crashed run can
//! resume from the last one instead of replaying from the entry node.
//!
//! Condition expressions (`decision` edges) are evaluated with [`evalexpr`],
//! the same crate the calculator tool already uses for the kernel's other
//! embedded-expression surface. evalexpr's native precedence is used as-is:
//! `!` binds tightest, then comparisons, then `&&`, then `||`; comparisons
//! are not chainable (`a < b < c` is a type error, not transitive).

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use evalexpr::{ContextWithMutableVariables, HashMapContext, Value as EvalValue};
use serde_json::Value as JsonValue;

use crate::kernel::agent_registry::AgentRegistry;

#[derive(Debug)]
pub enum WorkflowError {
    /// A node, edge target, or fallback named a node id absent from the graph.
    UnknownNode(String),
    /// A condition expression failed to parse or evaluate, or didn't reduce to a boolean.
    ConditionError { node: String, expression: String, detail: String },
    /// A decision node had no matching edge and no fallback.
    NoMatchingEdge(String),
    /// An action node named an agent id not present (or not enabled) in the registry.
    AgentNotFound(String),
    /// The agent call itself failed.
    AgentCallFailed(String),
    /// A parallel node's branches weren't single-hop action nodes converging on one node.
    InvalidParallelBranch { node: String, detail: String },
    /// `restore_from_checkpoint` was asked for an id that doesn't exist.
    CheckpointNotFound(String),
    /// `resume` was called on a workflow that wasn't paused.
    NotPaused,
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::UnknownNode(id) => write!(f, "unknown workflow node: {}", id),
            WorkflowError::ConditionError { node, expression, detail } => {
                write!(f, "node {} condition `{}` failed: {}", node, expression, detail)
            }
            WorkflowError::NoMatchingEdge(node) => write!(f, "node {} has no matching edge and no fallback", node),
            WorkflowError::AgentNotFound(id) => write!(f, "agent {} not registered or not enabled", id),
            WorkflowError::AgentCallFailed(msg) => write!(f, "agent call failed: {}", msg),
            WorkflowError::InvalidParallelBranch { node, detail } => {
                write!(f, "parallel node {} misconfigured: {}", node, detail)
            }
            WorkflowError::CheckpointNotFound(id) => write!(f, "no checkpoint with id {}", id),
            WorkflowError::NotPaused => write!(f, "workflow is not paused"),
        }
    }
}

impl Error for WorkflowError {}

/// Lifecycle status of a running [`Workflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// An outgoing edge. `condition` is `None` for every node kind except
/// `decision`, where it gates whether this edge is taken.
#[derive(Debug, Clone)]
pub struct Edge {
    pub to: String,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Dispatch `prompt` (after template rendering against workflow state) to `agent_id`.
    Action { agent_id: String, prompt: String },
    /// Evaluate each outgoing edge's condition in order; take the first that's true.
    Decision,
    /// Pause the workflow; a caller must supply input and call `resume`.
    HumanInput,
    /// Run another workflow to completion, folding its final state in under this node's name.
    Subgraph { workflow: String },
    /// Fan out to every outgoing edge's target concurrently, then join at a shared node.
    Parallel,
    /// Join point for a preceding `parallel` node. No-op beyond advancing.
    Converge,
}

#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub name: String,
    pub kind: NodeKind,
    pub successors: Vec<Edge>,
    pub fallback: Option<String>,
}

impl WorkflowNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self { name: name.into(), kind, successors: Vec::new(), fallback: None }
    }

    pub fn with_successor(mut self, to: impl Into<String>, condition: Option<String>) -> Self {
        self.successors.push(Edge { to: to.into(), condition });
        self
    }

    pub fn with_fallback(mut self, to: impl Into<String>) -> Self {
        self.fallback = Some(to.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowCheckpoint {
    pub id: String,
    pub node: String,
    pub status: WorkflowStatus,
    pub state_json: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A user-built DAG together with its mutable run state.
pub struct Workflow {
    pub name: String,
    entry: String,
    nodes: HashMap<String, WorkflowNode>,
    pub state: HashMap<String, JsonValue>,
    pub status: WorkflowStatus,
    current: Option<String>,
    checkpoints: Vec<WorkflowCheckpoint>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: entry.into(),
            nodes: HashMap::new(),
            state: HashMap::new(),
            status: WorkflowStatus::Pending,
            current: None,
            checkpoints: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: WorkflowNode) {
        self.nodes.insert(node.name.clone(), node);
    }

    /// Every successor and fallback must name a node that actually exists,
    /// and the entry node must exist. Catches typos in a hand-built graph
    /// before the first step rather than mid-run.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if !self.nodes.contains_key(&self.entry) {
            return Err(WorkflowError::UnknownNode(self.entry.clone()));
        }
        for node in self.nodes.values() {
            for edge in &node.successors {
                if !self.nodes.contains_key(&edge.to) {
                    return Err(WorkflowError::UnknownNode(edge.to.clone()));
                }
            }
            if let Some(fallback) = &node.fallback {
                if !self.nodes.contains_key(fallback) {
                    return Err(WorkflowError::UnknownNode(fallback.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn checkpoints(&self) -> &[WorkflowCheckpoint] {
        &self.checkpoints
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

/// Render `{{key}}` placeholders against a flat string-keyed state map.
/// Numbers and booleans render via their JSON textual form; missing keys
/// are left untouched so a malformed template is visible in the output.
pub fn render_template(template: &str, state: &HashMap<String, JsonValue>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find("}}") {
            let key = after[..end].trim();
            match state.get(key) {
                Some(JsonValue::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => {
                    out.push_str("{{");
                    out.push_str(key);
                    out.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        } else {
            out.push_str("{{");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Map a `serde_json::Value` onto the `evalexpr::Value` it evaluates as.
/// Arrays and objects have no direct evalexpr representation, so they
/// lower to their JSON text and can only be compared for string equality.
pub fn json_to_eval_value(value: &JsonValue) -> EvalValue {
    match value {
        JsonValue::Null => EvalValue::Empty,
        JsonValue::Bool(b) => EvalValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                EvalValue::Int(i)
            } else {
                EvalValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => EvalValue::String(s.clone()),
        other => EvalValue::String(other.to_string()),
    }
}

/// Evaluate `expression` against `state`, requiring a boolean result.
pub fn evaluate_condition(
    node: &str,
    expression: &str,
    state: &HashMap<String, JsonValue>,
) -> Result<bool, WorkflowError> {
    let mut context = HashMapContext::new();
    for (key, value) in state {
        context
            .set_value(key.clone(), json_to_eval_value(value))
            .map_err(|e| WorkflowError::ConditionError {
                node: node.to_string(),
                expression: expression.to_string(),
                detail: e.to_string(),
            })?;
    }
    let result = evalexpr::eval_boolean_with_context(expression, &context).map_err(|e| WorkflowError::ConditionError {
        node: node.to_string(),
        expression: expression.to_string(),
        detail: e.to_string(),
    })?;
    Ok(result)
}

/// Walks a [`Workflow`]'s node graph, dispatching `action` nodes to the
/// registry and persisting a checkpoint after every transition.
pub struct WorkflowEngine {
    registry: Arc<AgentRegistry>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Run `workflow` from its entry node (or its last checkpointed node, if
    /// already in progress) until it pauses, completes, fails, or is cancelled.
    pub async fn run(&self, workflow: &mut Workflow) -> Result<WorkflowStatus, WorkflowError> {
        if workflow.current.is_none() {
            workflow.current = Some(workflow.entry.clone());
        }
        workflow.status = WorkflowStatus::Running;

        loop {
            let name = match &workflow.current {
                Some(n) => n.clone(),
                None => break,
            };
            let node = workflow.nodes.get(&name).ok_or_else(|| WorkflowError::UnknownNode(name.clone()))?.clone();

            match &node.kind {
                NodeKind::HumanInput => {
                    workflow.status = WorkflowStatus::Paused;
                    self.checkpoint(workflow);
                    return Ok(WorkflowStatus::Paused);
                }
                NodeKind::Action { agent_id, prompt } => {
                    let rendered = render_template(prompt, &workflow.state);
                    let mut agent = self
                        .registry
                        .fork_agent(agent_id)
                        .await
                        .ok_or_else(|| WorkflowError::AgentNotFound(agent_id.clone()))?;
                    let response =
                        agent.send(&rendered).await.map_err(|e| WorkflowError::AgentCallFailed(e.to_string()))?;
                    workflow.state.insert(node.name.clone(), JsonValue::String(response.content));
                }
                NodeKind::Decision => {
                    // handled by next_node below
                }
                NodeKind::Converge => {
                    // join point: state was already populated by the parallel node that led here
                }
                NodeKind::Subgraph { workflow: _ } => {
                    // Running a nested workflow to completion is a caller-level concern: the
                    // caller owns the child `Workflow`/`WorkflowEngine` pair and folds its
                    // final state into this node's entry before resuming.
                }
                NodeKind::Parallel => {
                    self.run_parallel(workflow, &node).await?;
                    workflow.current = node.successors.first().map(|e| e.to.clone());
                    self.checkpoint(workflow);
                    if workflow.current.is_none() {
                        workflow.status = WorkflowStatus::Completed;
                        return Ok(WorkflowStatus::Completed);
                    }
                    continue;
                }
            }

            let next = self.next_node(workflow, &node)?;
            workflow.current = next;
            self.checkpoint(workflow);

            if workflow.current.is_none() {
                workflow.status = WorkflowStatus::Completed;
                return Ok(WorkflowStatus::Completed);
            }
        }

        workflow.status = WorkflowStatus::Completed;
        Ok(WorkflowStatus::Completed)
    }

    /// Resume a paused workflow after a caller has written the human's
    /// answer into `workflow.state`.
    pub async fn resume(&self, workflow: &mut Workflow) -> Result<WorkflowStatus, WorkflowError> {
        if workflow.status != WorkflowStatus::Paused {
            return Err(WorkflowError::NotPaused);
        }
        let name = workflow.current.clone().ok_or(WorkflowError::NotPaused)?;
        let node = workflow.nodes.get(&name).ok_or_else(|| WorkflowError::UnknownNode(name.clone()))?.clone();
        let next = self.next_node(workflow, &node)?;
        workflow.current = next;
        workflow.status = WorkflowStatus::Running;
        self.run(workflow).await
    }

    pub fn cancel(&self, workflow: &mut Workflow) {
        workflow.status = WorkflowStatus::Cancelled;
        self.checkpoint(workflow);
    }

    /// First edge whose condition evaluates true (or that carries no
    /// condition, for non-decision nodes); falls back to `node.fallback`;
    /// `Ok(None)` means the node is terminal.
    fn next_node(&self, workflow: &Workflow, node: &WorkflowNode) -> Result<Option<String>, WorkflowError> {
        for edge in &node.successors {
            let take = match &edge.condition {
                Some(expr) => evaluate_condition(&node.name, expr, &workflow.state)?,
                None => true,
            };
            if take {
                return Ok(Some(edge.to.clone()));
            }
        }
        if let Some(fallback) = &node.fallback {
            return Ok(Some(fallback.clone()));
        }
        if node.successors.iter().any(|e| e.condition.is_some()) {
            return Err(WorkflowError::NoMatchingEdge(node.name.clone()));
        }
        Ok(None)
    }

    /// Dispatch every successor of a `parallel` node concurrently. Each
    /// successor must be a single-hop `action` node whose own sole successor
    /// is the same join node — the graph's way of saying "these run
    /// together, then converge here."
    async fn run_parallel(&self, workflow: &mut Workflow, parallel_node: &WorkflowNode) -> Result<(), WorkflowError> {
        let mut agent_ids = Vec::with_capacity(parallel_node.successors.len());
        let mut branch_names = Vec::with_capacity(parallel_node.successors.len());
        let mut prompts = Vec::with_capacity(parallel_node.successors.len());
        let mut join_target: Option<String> = None;

        for edge in &parallel_node.successors {
            let branch = workflow.nodes.get(&edge.to).ok_or_else(|| WorkflowError::UnknownNode(edge.to.clone()))?;
            let (agent_id, prompt) = match &branch.kind {
                NodeKind::Action { agent_id, prompt } => (agent_id.clone(), prompt.clone()),
                _ => {
                    return Err(WorkflowError::InvalidParallelBranch {
                        node: parallel_node.name.clone(),
                        detail: format!("branch {} is not an action node", branch.name),
                    })
                }
            };
            let branch_target = branch
                .successors
                .first()
                .map(|e| e.to.clone())
                .ok_or_else(|| WorkflowError::InvalidParallelBranch {
                    node: parallel_node.name.clone(),
                    detail: format!("branch {} has no join successor", branch.name),
                })?;
            match &join_target {
                None => join_target = Some(branch_target),
                Some(existing) if *existing != branch_target => {
                    return Err(WorkflowError::InvalidParallelBranch {
                        node: parallel_node.name.clone(),
                        detail: "branches converge on different nodes".to_string(),
                    })
                }
                _ => {}
            }
            branch_names.push(branch.name.clone());
            agent_ids.push(agent_id);
            prompts.push(render_template(&prompt, &workflow.state));
        }

        let prompts_by_agent: HashMap<String, String> =
            agent_ids.iter().cloned().zip(prompts.into_iter()).collect();
        let results = self
            .registry
            .execute_parallel(&agent_ids, move |mut agent, agent_id| {
                let prompt = prompts_by_agent.get(&agent_id).cloned().unwrap_or_default();
                async move { agent.send(&prompt).await }
            })
            .await;

        for (branch_name, result) in branch_names.iter().zip(results.into_iter()) {
            match result {
                Some((_, _, Ok(resp))) => {
                    workflow.state.insert(branch_name.clone(), JsonValue::String(resp.content));
                }
                Some((agent_id, _, Err(e))) => {
                    return Err(WorkflowError::AgentCallFailed(format!("{}: {}", agent_id, e)));
                }
                None => {
                    return Err(WorkflowError::AgentNotFound(branch_name.clone()));
                }
            }
        }

        Ok(())
    }

    fn checkpoint(&self, workflow: &mut Workflow) {
        let state_json = serde_json::to_string(&workflow.state).unwrap_or_default();
        workflow.checkpoints.push(WorkflowCheckpoint {
            id: uuid::Uuid::new_v4().to_string(),
            node: workflow.current.clone().unwrap_or_default(),
            status: workflow.status,
            state_json,
            created_at: chrono::Utc::now(),
        });
    }

    /// Restore `workflow`'s state and current node from a prior checkpoint,
    /// discarding every later checkpoint so `run`/`resume` pick back up from
    /// exactly that point.
    pub fn restore_from_checkpoint(&self, workflow: &mut Workflow, checkpoint_id: &str) -> Result<(), WorkflowError> {
        let pos = workflow
            .checkpoints
            .iter()
            .position(|c| c.id == checkpoint_id)
            .ok_or_else(|| WorkflowError::CheckpointNotFound(checkpoint_id.to_string()))?;
        let checkpoint = workflow.checkpoints[pos].clone();
        workflow.state = serde_json::from_str(&checkpoint.state_json).unwrap_or_default();
        workflow.current = Some(checkpoint.node.clone());
        workflow.status = checkpoint.status;
        workflow.checkpoints.truncate(pos + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::agent::Agent;
    use crate::kernel::agent_registry::Role as AgentRole;
    use crate::kernel::client_wrapper::{ClientWrapper, Message, Role, ToolDefinition};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClient {
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
            Ok(Message { role: Role::Assistant, content: Arc::from(self.reply.as_str()), tool_calls: vec![] })
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    async fn registry_with(agent_names: &[(&str, &str)]) -> Arc<AgentRegistry> {
        let registry = Arc::new(AgentRegistry::new());
        for (name, reply) in agent_names {
            let client = Arc::new(StubClient { reply: reply.to_string(), calls: AtomicUsize::new(0) });
            let agent = Agent::new(name.to_string(), name.to_string(), client);
            registry.register(agent, AgentRole::Coder).await;
        }
        registry
    }

    #[tokio::test]
    async fn runs_a_linear_action_chain_to_completion() {
        let registry = registry_with(&[("writer", "drafted")]).await;
        let engine = WorkflowEngine::new(registry);

        let mut workflow = Workflow::new("draft", "write");
        workflow.add_node(
            WorkflowNode::new("write", NodeKind::Action { agent_id: "writer".into(), prompt: "go".into() })
                .with_successor("done", None),
        );
        workflow.add_node(WorkflowNode::new("done", NodeKind::Converge));
        workflow.validate().unwrap();

        let status = engine.run(&mut workflow).await.unwrap();
        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(workflow.state.get("write").unwrap(), &JsonValue::String("drafted".into()));
    }

    #[tokio::test]
    async fn decision_node_takes_the_first_matching_edge() {
        let registry = registry_with(&[("a", "a-reply"), ("b", "b-reply")]).await;
        let engine = WorkflowEngine::new(registry);

        let mut workflow = Workflow::new("branch", "check");
        workflow.state.insert("go_right".to_string(), JsonValue::Bool(true));
        workflow.add_node(
            WorkflowNode::new("check", NodeKind::Decision)
                .with_successor("left", Some("go_right == false".to_string()))
                .with_successor("right", Some("go_right == true".to_string())),
        );
        workflow.add_node(WorkflowNode::new(
            "left",
            NodeKind::Action { agent_id: "a".into(), prompt: "p".into() },
        ));
        workflow.add_node(WorkflowNode::new(
            "right",
            NodeKind::Action { agent_id: "b".into(), prompt: "p".into() },
        ));
        workflow.validate().unwrap();

        engine.run(&mut workflow).await.unwrap();
        assert_eq!(workflow.state.get("right").unwrap(), &JsonValue::String("b-reply".into()));
        assert!(!workflow.state.contains_key("left"));
    }

    #[tokio::test]
    async fn human_input_node_pauses_and_resume_continues() {
        let registry = registry_with(&[("closer", "closed")]).await;
        let engine = WorkflowEngine::new(registry);

        let mut workflow = Workflow::new("approval", "ask");
        workflow.add_node(WorkflowNode::new("ask", NodeKind::HumanInput).with_successor("close", None));
        workflow.add_node(WorkflowNode::new(
            "close",
            NodeKind::Action { agent_id: "closer".into(), prompt: "p".into() },
        ));
        workflow.validate().unwrap();

        let status = engine.run(&mut workflow).await.unwrap();
        assert_eq!(status, WorkflowStatus::Paused);
        assert_eq!(workflow.current_node(), Some("ask"));

        workflow.state.insert("approved".to_string(), JsonValue::Bool(true));
        let status = engine.resume(&mut workflow).await.unwrap();
        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(workflow.state.get("close").unwrap(), &JsonValue::String("closed".into()));
    }

    #[tokio::test]
    async fn parallel_node_joins_branches_before_advancing() {
        let registry = registry_with(&[("r1", "r1-out"), ("r2", "r2-out")]).await;
        let engine = WorkflowEngine::new(registry);

        let mut workflow = Workflow::new("fanout", "split");
        workflow.add_node(
            WorkflowNode::new("split", NodeKind::Parallel)
                .with_successor("b1", None)
                .with_successor("b2", None),
        );
        workflow.add_node(
            WorkflowNode::new("b1", NodeKind::Action { agent_id: "r1".into(), prompt: "p".into() })
                .with_successor("join", None),
        );
        workflow.add_node(
            WorkflowNode::new("b2", NodeKind::Action { agent_id: "r2".into(), prompt: "p".into() })
                .with_successor("join", None),
        );
        workflow.add_node(WorkflowNode::new("join", NodeKind::Converge));
        workflow.validate().unwrap();

        let status = engine.run(&mut workflow).await.unwrap();
        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(workflow.state.get("b1").unwrap(), &JsonValue::String("r1-out".into()));
        assert_eq!(workflow.state.get("b2").unwrap(), &JsonValue::String("r2-out".into()));
    }

    #[tokio::test]
    async fn checkpoint_and_restore_rewind_state() {
        let registry = registry_with(&[("writer", "first"), ("writer2", "second")]).await;
        let engine = WorkflowEngine::new(registry);

        let mut workflow = Workflow::new("two-step", "step1");
        workflow.add_node(
            WorkflowNode::new("step1", NodeKind::Action { agent_id: "writer".into(), prompt: "p".into() })
                .with_successor("step2", None),
        );
        workflow.add_node(WorkflowNode::new(
            "step2",
            NodeKind::Action { agent_id: "writer2".into(), prompt: "p".into() },
        ));
        workflow.validate().unwrap();

        engine.run(&mut workflow).await.unwrap();
        let first_checkpoint = workflow.checkpoints()[0].id.clone();

        engine.restore_from_checkpoint(&mut workflow, &first_checkpoint).unwrap();
        assert_eq!(workflow.current_node(), Some("step2"));
        assert!(!workflow.state.contains_key("step2"));
    }

    #[test]
    fn render_template_substitutes_known_keys_and_leaves_unknown_alone() {
        let mut state = HashMap::new();
        state.insert("name".to_string(), JsonValue::String("Ali".to_string()));
        let out = render_template("hello {{name}}, {{missing}}", &state);
        assert_eq!(out, "hello Ali, {{missing}}");
    }

    #[test]
    fn evaluate_condition_reads_workflow_state() {
        let mut state = HashMap::new();
        state.insert("count".to_string(), JsonValue::from(3));
        assert!(evaluate_condition("n", "count > 2", &state).unwrap());
        assert!(!evaluate_condition("n", "count > 2 && count < 3", &state).unwrap());
    }

    #[test]
    fn validate_rejects_dangling_successor() {
        let mut workflow = Workflow::new("bad", "start");
        workflow.add_node(WorkflowNode::new("start", NodeKind::Converge).with_successor("nowhere", None));
        let err = workflow.validate().unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownNode(_)));
    }
}
