//! Breaks a user goal into a dependency-ordered task graph via a single LLM
//! call, then validates and topologically sorts the result before it's
//! handed to [`PlanDb`](crate::kernel::plan_db::PlanDb).
//!
//! The model is asked to emit tasks in an order where each task may only
//! depend on tasks that appear earlier in its own output — a forward-only
//! DAG by construction — but a model can still hallucinate a dependency on
//! a later or nonexistent id, so [`TaskDecomposer::decompose`] re-validates
//! the graph itself rather than trusting the ordering it asked for.

use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;

use crate::kernel::client_wrapper::{ClientWrapper, Message, Role};

/// How many times a ready task may be retried by
/// [`task_execute_parallel`] before it's left failed.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug)]
pub enum DecomposeError {
    /// The model's response wasn't valid JSON, or didn't match the expected shape.
    MalformedResponse(String),
    /// A task named a `depends_on` id that doesn't correspond to any task in the plan.
    DanglingDependency { task_index: usize, missing_id: usize },
    /// A task depended on itself or on a later task, breaking the forward-only invariant.
    BackwardOrSelfDependency { task_index: usize, dependency_id: usize },
    /// The dependency graph contains a cycle (only reachable if the forward-only
    /// check above has a bug, but checked independently via Kahn's algorithm
    /// as defense in depth).
    CycleDetected,
    /// The model returned zero tasks for a non-trivial goal.
    EmptyPlan,
}

impl fmt::Display for DecomposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecomposeError::MalformedResponse(msg) => write!(f, "malformed decomposition response: {}", msg),
            DecomposeError::DanglingDependency { task_index, missing_id } => {
                write!(f, "task {} depends on nonexistent task {}", task_index, missing_id)
            }
            DecomposeError::BackwardOrSelfDependency { task_index, dependency_id } => write!(
                f,
                "task {} has a backward or self dependency on task {}",
                task_index, dependency_id
            ),
            DecomposeError::CycleDetected => write!(f, "task dependency graph contains a cycle"),
            DecomposeError::EmptyPlan => write!(f, "decomposition produced no tasks"),
        }
    }
}

impl Error for DecomposeError {}

/// A single task as named in the decomposition, identified by its position
/// (0-based) in the model's output.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedTask {
    pub id: usize,
    pub description: String,
    pub role: String,
    pub depends_on: Vec<usize>,
    /// How many times this task may still be retried after a failed
    /// attempt, decremented by [`task_execute_parallel`] on each failure.
    pub retries_remaining: u32,
    /// Attempts made so far. Starts at 0; a task that has exhausted
    /// `retries_remaining` after incrementing this is left failed rather
    /// than re-queued.
    pub attempts: u32,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    description: String,
    #[serde(default = "default_role")]
    role: String,
    #[serde(default)]
    depends_on: Vec<usize>,
    #[serde(default = "default_retries")]
    max_retries: u32,
}

fn default_role() -> String {
    "engineer".to_string()
}

fn default_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

pub struct TaskDecomposer {
    client: Arc<dyn ClientWrapper>,
}

impl TaskDecomposer {
    pub fn new(client: Arc<dyn ClientWrapper>) -> Self {
        Self { client }
    }

    /// Ask the model to break `goal` into tasks, then validate and
    /// topologically sort the result. The returned order is a valid
    /// execution order (every task appears after everything it depends on).
    pub async fn decompose(&self, goal: &str) -> Result<Vec<DecomposedTask>, DecomposeError> {
        let prompt = format!(
            "Break the following goal into an ordered list of concrete tasks. \
             Respond with ONLY a JSON array, no prose. Each element must be an object with \
             \"description\" (string), \"role\" (one of: orchestrator, researcher, engineer, \
             reviewer, writer, analyst), \"depends_on\" (array of 0-based indices into this \
             same array, each strictly less than the task's own index), and optionally \
             \"max_retries\" (integer, defaults to 2 if omitted).\n\nGoal: {}",
            goal
        );

        let response = self
            .client
            .send_message(
                &[Message { role: Role::User, content: Arc::from(prompt.as_str()), tool_calls: vec![] }],
                None,
            )
            .await
            .map_err(|e| DecomposeError::MalformedResponse(e.to_string()))?;

        let raw = extract_json_array(&response.content)
            .ok_or_else(|| DecomposeError::MalformedResponse("no JSON array found in response".to_string()))?;
        let raw_tasks: Vec<RawTask> =
            serde_json::from_str(raw).map_err(|e| DecomposeError::MalformedResponse(e.to_string()))?;

        if raw_tasks.is_empty() {
            return Err(DecomposeError::EmptyPlan);
        }

        let tasks: Vec<DecomposedTask> = raw_tasks
            .into_iter()
            .enumerate()
            .map(|(id, raw)| DecomposedTask {
                id,
                description: raw.description,
                role: raw.role,
                depends_on: raw.depends_on,
                retries_remaining: raw.max_retries,
                attempts: 0,
            })
            .collect();

        Self::validate_forward_only(&tasks)?;
        Self::topological_order(&tasks)
    }

    fn validate_forward_only(tasks: &[DecomposedTask]) -> Result<(), DecomposeError> {
        for task in tasks {
            for &dep in &task.depends_on {
                if dep >= tasks.len() {
                    return Err(DecomposeError::DanglingDependency { task_index: task.id, missing_id: dep });
                }
                if dep >= task.id {
                    return Err(DecomposeError::BackwardOrSelfDependency { task_index: task.id, dependency_id: dep });
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm: repeatedly remove nodes with in-degree zero. If any
    /// node remains un-removed at the end, the graph has a cycle.
    fn topological_order(tasks: &[DecomposedTask]) -> Result<Vec<DecomposedTask>, DecomposeError> {
        let n = tasks.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for task in tasks {
            in_degree[task.id] = task.depends_on.len();
            for &dep in &task.depends_on {
                dependents[dep].push(task.id);
            }
        }

        let mut queue: VecDeque<usize> =
            (0..n).filter(|&id| in_degree[id] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut visited = HashSet::new();

        while let Some(id) = queue.pop_front() {
            order.push(id);
            visited.insert(id);
            for &dependent in &dependents[id] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if visited.len() != n {
            return Err(DecomposeError::CycleDetected);
        }

        let by_id: HashMap<usize, DecomposedTask> =
            tasks.iter().cloned().map(|t| (t.id, t)).collect();
        Ok(order.into_iter().map(|id| by_id[&id].clone()).collect())
    }
}

/// Whether every task `id` depends on is already in `completed`. A task with
/// no dependencies is trivially ready.
pub fn task_prerequisites_met(task: &DecomposedTask, completed: &HashSet<usize>) -> bool {
    task.depends_on.iter().all(|dep| completed.contains(dep))
}

/// Tasks from `tasks` that are ready to run right now: not yet completed,
/// not already dispatched (`in_flight`), and every dependency satisfied.
/// Order is preserved from `tasks` so a wave's dispatch order stays
/// deterministic across runs with the same decomposition.
pub fn task_get_ready<'a>(
    tasks: &'a [DecomposedTask],
    completed: &HashSet<usize>,
    in_flight: &HashSet<usize>,
) -> Vec<&'a DecomposedTask> {
    tasks
        .iter()
        .filter(|t| !completed.contains(&t.id) && !in_flight.contains(&t.id) && task_prerequisites_met(t, completed))
        .collect()
}

/// Dispatch every task in `ready` concurrently via `executor`, preserving
/// `ready`'s order in the returned results regardless of completion order —
/// the same index-stable convention [`AgentRegistry::execute_parallel`](crate::kernel::agent_registry::AgentRegistry::execute_parallel)
/// uses. A task whose executor call fails and still has
/// `retries_remaining > 0` is reported as [`TaskOutcome::Retry`] rather than
/// [`TaskOutcome::Failed`], so the caller can re-enqueue it into a later
/// wave instead of abandoning the plan.
pub async fn task_execute_parallel<F, Fut>(ready: &[DecomposedTask], executor: F) -> Vec<TaskOutcome>
where
    F: Fn(DecomposedTask) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, String>> + Send + 'static,
{
    let executor = Arc::new(executor);
    let mut handles = Vec::with_capacity(ready.len());
    for task in ready {
        let task = task.clone();
        let executor = Arc::clone(&executor);
        handles.push(tokio::spawn(async move {
            let id = task.id;
            let attempts = task.attempts + 1;
            let retries_remaining = task.retries_remaining;
            match executor(task).await {
                Ok(result) => TaskOutcome::Completed { id, result },
                Err(error) if retries_remaining > 0 => {
                    TaskOutcome::Retry { id, error, attempts, retries_remaining: retries_remaining - 1 }
                }
                Err(error) => TaskOutcome::Failed { id, error },
            }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (idx, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => outcomes.push(TaskOutcome::Failed { id: ready[idx].id, error: join_err.to_string() }),
        }
    }
    outcomes
}

/// Result of dispatching a single task via [`task_execute_parallel`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed { id: usize, result: String },
    /// The task failed but has retries left; the caller should decrement
    /// the corresponding [`DecomposedTask::retries_remaining`] to
    /// `retries_remaining` and re-offer it in a later wave.
    Retry { id: usize, error: String, attempts: u32, retries_remaining: u32 },
    Failed { id: usize, error: String },
}

/// Strip code fences and leading/trailing prose a model commonly wraps JSON
/// in, returning the slice spanning the first `[` through its matching `]`.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
