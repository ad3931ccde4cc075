use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use ali_kernel::client_wrapper::{ClientWrapper, Message, Role, ToolDefinition};
use ali_kernel::kernel::task_decomposer::{
    task_execute_parallel, task_get_ready, task_prerequisites_met, DecomposeError, TaskDecomposer, TaskOutcome,
};

struct StubClient {
    body: String,
}

#[async_trait]
impl ClientWrapper for StubClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn std::error::Error>> {
        Ok(Message { role: Role::Assistant, content: Arc::from(self.body.as_str()), tool_calls: vec![] })
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

#[tokio::test]
async fn decompose_sorts_a_valid_dag_topologically() {
    let body = r#"
        Sure, here is the plan:
        [
            {"description": "design schema", "role": "analyst", "depends_on": []},
            {"description": "write migration", "role": "engineer", "depends_on": [0]},
            {"description": "review migration", "role": "reviewer", "depends_on": [1]}
        ]
    "#;
    let decomposer = TaskDecomposer::new(Arc::new(StubClient { body: body.to_string() }));
    let tasks = decomposer.decompose("add a users table").await.unwrap();

    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].description, "design schema");
    assert_eq!(tasks[2].description, "review migration");
    assert_eq!(tasks[0].retries_remaining, 2);
}

#[tokio::test]
async fn decompose_honors_an_explicit_max_retries() {
    let body = r#"[{"description": "flaky step", "role": "engineer", "depends_on": [], "max_retries": 5}]"#;
    let decomposer = TaskDecomposer::new(Arc::new(StubClient { body: body.to_string() }));
    let tasks = decomposer.decompose("goal").await.unwrap();
    assert_eq!(tasks[0].retries_remaining, 5);
    assert_eq!(tasks[0].attempts, 0);
}

#[tokio::test]
async fn rejects_backward_dependency() {
    let body = r#"[
        {"description": "a", "role": "engineer", "depends_on": [1]},
        {"description": "b", "role": "engineer", "depends_on": []}
    ]"#;
    let decomposer = TaskDecomposer::new(Arc::new(StubClient { body: body.to_string() }));
    let err = decomposer.decompose("goal").await.unwrap_err();
    assert!(matches!(err, DecomposeError::BackwardOrSelfDependency { .. }));
}

#[tokio::test]
async fn rejects_dangling_dependency() {
    let body = r#"[
        {"description": "a", "role": "engineer", "depends_on": [5]}
    ]"#;
    let decomposer = TaskDecomposer::new(Arc::new(StubClient { body: body.to_string() }));
    let err = decomposer.decompose("goal").await.unwrap_err();
    assert!(matches!(err, DecomposeError::DanglingDependency { .. }));
}

#[tokio::test]
async fn rejects_empty_plan() {
    let decomposer = TaskDecomposer::new(Arc::new(StubClient { body: "[]".to_string() }));
    let err = decomposer.decompose("goal").await.unwrap_err();
    assert!(matches!(err, DecomposeError::EmptyPlan));
}

#[tokio::test]
async fn ready_wave_excludes_tasks_with_unmet_dependencies() {
    let decomposer = TaskDecomposer::new(Arc::new(StubClient {
        body: r#"[
            {"description": "root", "role": "engineer", "depends_on": []},
            {"description": "child", "role": "engineer", "depends_on": [0]}
        ]"#
        .to_string(),
    }));
    let tasks = decomposer.decompose("goal").await.unwrap();

    let completed = HashSet::new();
    let in_flight = HashSet::new();
    let ready = task_get_ready(&tasks, &completed, &in_flight);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, 0);
    assert!(!task_prerequisites_met(&tasks[1], &completed));

    let mut completed = HashSet::new();
    completed.insert(0);
    assert!(task_prerequisites_met(&tasks[1], &completed));
    let ready = task_get_ready(&tasks, &completed, &in_flight);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, 1);
}

#[tokio::test]
async fn execute_parallel_preserves_order_and_reports_completion() {
    let decomposer = TaskDecomposer::new(Arc::new(StubClient {
        body: r#"[
            {"description": "a", "role": "engineer", "depends_on": []},
            {"description": "b", "role": "engineer", "depends_on": []}
        ]"#
        .to_string(),
    }));
    let tasks = decomposer.decompose("goal").await.unwrap();

    let outcomes = task_execute_parallel(&tasks, |task| async move { Ok(format!("done: {}", task.description)) }).await;

    assert_eq!(outcomes.len(), 2);
    match &outcomes[0] {
        TaskOutcome::Completed { id, result } => {
            assert_eq!(*id, 0);
            assert_eq!(result, "done: a");
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    match &outcomes[1] {
        TaskOutcome::Completed { id, .. } => assert_eq!(*id, 1),
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn execute_parallel_reports_retry_when_attempts_remain() {
    let decomposer = TaskDecomposer::new(Arc::new(StubClient {
        body: r#"[{"description": "flaky", "role": "engineer", "depends_on": [], "max_retries": 1}]"#.to_string(),
    }));
    let tasks = decomposer.decompose("goal").await.unwrap();

    let outcomes = task_execute_parallel(&tasks, |_task| async move { Err("boom".to_string()) }).await;

    match &outcomes[0] {
        TaskOutcome::Retry { id, retries_remaining, attempts, .. } => {
            assert_eq!(*id, 0);
            assert_eq!(*retries_remaining, 0);
            assert_eq!(*attempts, 1);
        }
        other => panic!("expected Retry, got {other:?}"),
    }
}

#[tokio::test]
async fn execute_parallel_reports_failed_once_retries_are_exhausted() {
    let decomposer = TaskDecomposer::new(Arc::new(StubClient {
        body: r#"[{"description": "dead", "role": "engineer", "depends_on": [], "max_retries": 0}]"#.to_string(),
    }));
    let tasks = decomposer.decompose("goal").await.unwrap();

    let outcomes = task_execute_parallel(&tasks, |_task| async move { Err("boom".to_string()) }).await;

    match &outcomes[0] {
        TaskOutcome::Failed { id, error } => {
            assert_eq!(*id, 0);
            assert_eq!(error, "boom");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}
