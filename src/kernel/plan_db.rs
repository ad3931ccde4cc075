//! Durable plan storage with compare-and-swap task claiming.
//!
//! A second SQLite database (separate file from [`Persistence`](crate::kernel::persistence::Persistence)
//! so the hot conversational write path never contends with planning
//! traffic), holding `plans` and `tasks` rows. Task claiming uses the same
//! `UPDATE ... WHERE status = 'pending'` + `changes()` pattern any
//! SQLite-backed queue uses for atomic claim-without-lost-update: the update
//! and the row-count check happen inside rusqlite's own implicit
//! transaction, so two workers racing to claim the same task can never both
//! see `changes() == 1`.
//!
//! Task dependency ordering (the DAG itself) is the [`TaskDecomposer`](crate::kernel::task_decomposer::TaskDecomposer)'s
//! concern, resolved entirely in memory before a wave of tasks is persisted
//! here. This store only ever orders by `(priority DESC, created_at ASC)`
//! and exposes atomic status transitions for multi-worker coordination.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug)]
pub struct PlanDbError {
    pub message: String,
}

impl fmt::Display for PlanDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan db error: {}", self.message)
    }
}

impl Error for PlanDbError {}

impl From<rusqlite::Error> for PlanDbError {
    fn from(e: rusqlite::Error) -> Self {
        PlanDbError { message: e.to_string() }
    }
}

/// Lifecycle status of a single task row, per spec.md §3:
/// `pending -> in_progress -> {completed, failed}`, with `waiting` reserved
/// for tasks blocked on subtasks (set only by [`PlanDb::block_task`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Waiting,
    Completed,
    Failed,
}

impl TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> TaskStatus {
        match s {
            "in_progress" => TaskStatus::InProgress,
            "waiting" => TaskStatus::Waiting,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub id: i64,
    pub goal: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: i64,
    pub plan_id: i64,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i64,
    pub parent_task_id: Option<i64>,
    pub assigned_agent: Option<String>,
    pub claimed_by: Option<String>,
    pub blocked_by: Vec<i64>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of [`PlanDb::claim_task`]: `Busy` covers every reason the CAS
/// didn't land (already claimed, already terminal, assigned to someone
/// else, or no such task) — spec.md §4.4 only distinguishes `OK | BUSY`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(TaskRecord),
    Busy,
}

pub struct PlanDb {
    conn: Mutex<Connection>,
}

impl PlanDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PlanDbError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, PlanDbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS plans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                goal TEXT NOT NULL,
                context TEXT,
                created_at TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL REFERENCES plans(id),
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                priority INTEGER NOT NULL DEFAULT 0,
                parent_task_id INTEGER,
                assigned_agent TEXT,
                claimed_by TEXT,
                blocked_by TEXT NOT NULL DEFAULT '',
                result TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_plan_status ON tasks(plan_id, status, priority DESC, created_at ASC);
            ",
        )?;
        Ok(())
    }

    /// Create a plan. `context` is an opaque caller-supplied string (e.g. a
    /// serialized scope identifier) persisted alongside the goal.
    pub fn create_plan(&self, goal: &str, context: Option<&str>) -> Result<i64, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO plans (goal, context, created_at, completed) VALUES (?1, ?2, ?3, 0)",
            params![goal, context, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_plan(&self, plan_id: i64) -> Result<Option<PlanRecord>, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, goal, context, created_at, completed FROM plans WHERE id = ?1",
            params![plan_id],
            |row| {
                let created_at: String = row.get(3)?;
                let completed: i64 = row.get(4)?;
                Ok(PlanRecord {
                    id: row.get(0)?,
                    goal: row.get(1)?,
                    context: row.get(2)?,
                    created_at: parse_ts(&created_at),
                    completed: completed != 0,
                })
            },
        )
        .optional()
        .map_err(PlanDbError::from)
    }

    /// Insert a task row in `pending` status. `agent`, if given, pre-assigns
    /// the task; `claim_task`/`get_next_task` still require that agent's
    /// name to match before a claim succeeds. `parent_task_id` records
    /// hierarchical lineage only — it plays no role in claim ordering.
    pub fn add_task(
        &self,
        plan_id: i64,
        description: &str,
        agent: Option<&str>,
        priority: i64,
        parent_task_id: Option<i64>,
    ) -> Result<i64, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tasks (plan_id, description, status, priority, parent_task_id, assigned_agent, created_at)
             VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6)",
            params![plan_id, description, priority, parent_task_id, agent, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Highest-priority pending task in `plan_id` that is either unassigned
    /// or pre-assigned to `agent`, ordered `(priority DESC, created_at ASC)`.
    pub fn get_next_task(&self, plan_id: i64, agent: &str) -> Result<Option<TaskRecord>, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, plan_id, description, status, priority, parent_task_id, assigned_agent, claimed_by, blocked_by, result, created_at
             FROM tasks
             WHERE plan_id = ?1 AND status = 'pending' AND (assigned_agent IS NULL OR assigned_agent = ?2)
             ORDER BY priority DESC, created_at ASC
             LIMIT 1",
            params![plan_id, agent],
            Self::row_to_task,
        )
        .optional()
        .map_err(PlanDbError::from)
    }

    /// Atomically transition `task_id` from `pending` directly to
    /// `in_progress`, assigning it to `agent`. Fails closed (`Busy`) if the
    /// task is already claimed, terminal, or pre-assigned to a different
    /// agent — whichever caller's `UPDATE` commits first wins; the loser
    /// sees `changes() == 0`.
    pub fn claim_task(&self, task_id: i64, agent: &str) -> Result<ClaimOutcome, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE tasks SET status = 'in_progress', claimed_by = ?1
             WHERE id = ?2 AND status = 'pending' AND (assigned_agent IS NULL OR assigned_agent = ?1)",
            params![agent, task_id],
        )?;
        if changed == 0 {
            return Ok(ClaimOutcome::Busy);
        }
        match self.load_task_locked(&conn, task_id)? {
            Some(task) => Ok(ClaimOutcome::Claimed(task)),
            None => Ok(ClaimOutcome::Busy),
        }
    }

    pub fn complete_task(&self, task_id: i64, result: &str) -> Result<(), PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET status = 'completed', result = ?1 WHERE id = ?2",
            params![result, task_id],
        )?;
        Ok(())
    }

    pub fn fail_task(&self, task_id: i64, result: &str) -> Result<(), PlanDbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET status = 'failed', result = ?1 WHERE id = ?2",
            params![result, task_id],
        )?;
        Ok(())
    }

    /// Mark `task_id` as `waiting`, recording the ids of the subtasks it's
    /// blocked on.
    pub fn block_task(&self, task_id: i64, blocked_by: &[i64]) -> Result<(), PlanDbError> {
        let conn = self.conn.lock().unwrap();
        let blocked = blocked_by.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",");
        conn.execute(
            "UPDATE tasks SET status = 'waiting', blocked_by = ?1 WHERE id = ?2",
            params![blocked, task_id],
        )?;
        Ok(())
    }

    pub fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        self.load_task_locked(&conn, task_id)
    }

    pub fn load_tasks_for_plan(&self, plan_id: i64) -> Result<Vec<TaskRecord>, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, plan_id, description, status, priority, parent_task_id, assigned_agent, claimed_by, blocked_by, result, created_at
             FROM tasks WHERE plan_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![plan_id], Self::row_to_task)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    fn load_task_locked(&self, conn: &Connection, task_id: i64) -> Result<Option<TaskRecord>, PlanDbError> {
        conn.query_row(
            "SELECT id, plan_id, description, status, priority, parent_task_id, assigned_agent, claimed_by, blocked_by, result, created_at
             FROM tasks WHERE id = ?1",
            params![task_id],
            Self::row_to_task,
        )
        .optional()
        .map_err(PlanDbError::from)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<TaskRecord> {
        let status: String = row.get(3)?;
        let blocked_raw: String = row.get(8)?;
        let created_at: String = row.get(10)?;
        Ok(TaskRecord {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            description: row.get(2)?,
            status: TaskStatus::from_str(&status),
            priority: row.get(4)?,
            parent_task_id: row.get(5)?,
            assigned_agent: row.get(6)?,
            claimed_by: row.get(7)?,
            blocked_by: parse_ids(&blocked_raw),
            result: row.get(9)?,
            created_at: parse_ts(&created_at),
        })
    }

    /// Whether every task in `plan_id` has reached a terminal status
    /// (`completed` or `failed`).
    pub fn plan_is_drained(&self, plan_id: i64) -> Result<bool, PlanDbError> {
        let conn = self.conn.lock().unwrap();
        let remaining: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE plan_id = ?1 AND status NOT IN ('completed', 'failed')",
            params![plan_id],
            |row| row.get(0),
        )?;
        Ok(remaining == 0)
    }

    /// Derive `plans.completed` from the terminal state of `plan_id`'s
    /// tasks and persist it.
    pub fn refresh_plan_status(&self, plan_id: i64) -> Result<bool, PlanDbError> {
        let drained = self.plan_is_drained(plan_id)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE plans SET completed = ?1 WHERE id = ?2",
            params![drained as i64, plan_id],
        )?;
        Ok(drained)
    }
}

fn parse_ids(raw: &str) -> Vec<i64> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').filter_map(|s| s.parse().ok()).collect()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
