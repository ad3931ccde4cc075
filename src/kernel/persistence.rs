//! SQLite-backed durable storage for sessions, messages, agents, memories,
//! checkpoints, cost rollups, and the semantic fabric's write-through store.
//!
//! Grounded on the `rusqlite` WAL-mode + single-mutex-guarded-connection
//! pattern used for on-disk stores elsewhere in the corpus
//! (`tandem-memory::db::MemoryDatabase`): one connection, opened once,
//! guarded by a `std::sync::Mutex` so concurrent writers serialize instead of
//! colliding on SQLite's own locking and returning `SQLITE_BUSY`. Readers
//! still benefit from WAL's snapshot isolation once they get the mutex.
//!
//! Long-running maintenance (`VACUUM`, schema migration) should use a
//! dedicated short-lived connection rather than the hot mutex — none of the
//! methods here need one yet, so that path is left for a future migration
//! tool rather than implemented speculatively.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Error surfaced by any persistence operation.
#[derive(Debug)]
pub struct PersistenceError {
    pub message: String,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence error: {}", self.message)
    }
}

impl Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        PersistenceError { message: e.to_string() }
    }
}

/// A row from the `messages` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub parent_id: Option<i64>,
    pub tokens_in: usize,
    pub tokens_out: usize,
}

/// A row from the `sessions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub user_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_cost: f64,
    pub total_messages: i64,
}

/// A row from the `agents` table.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub name: String,
    pub role: String,
    pub system_prompt: String,
    pub context: Option<String>,
    pub color: Option<String>,
    pub tools_json: String,
}

/// A row from the `checkpoints` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub session_id: i64,
    pub checkpoint_num: i64,
    pub from_msg_id: i64,
    pub to_msg_id: i64,
    pub messages_compressed: i64,
    pub summary: String,
    pub key_facts: String,
    pub original_tokens: i64,
    pub compressed_tokens: i64,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

/// A row from the `memories` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: i64,
    pub content: String,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
}

/// A row from the `cost_daily` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CostDailyRecord {
    pub date: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
    pub calls: i64,
}

/// A row from the `semantic_nodes` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticNodeRecord {
    pub id: i64,
    pub node_type: String,
    pub essence: String,
    pub embedding_blob: Vec<u8>,
    pub creator_id: String,
    pub context_id: String,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
}

/// A row from the `semantic_relations` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticRelationRecord {
    pub from_id: i64,
    pub to_id: i64,
    pub strength: f64,
    pub relation_type: String,
}

/// A single `std::sync::Mutex<rusqlite::Connection>`-guarded SQLite handle,
/// opened in WAL mode once per process.
pub struct Persistence {
    conn: Mutex<Connection>,
}

impl Persistence {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory database, handy for tests that don't need a file on disk.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                total_cost REAL NOT NULL DEFAULT 0.0,
                total_messages INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                parent_id INTEGER,
                tokens_in INTEGER NOT NULL DEFAULT 0,
                tokens_out INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id, id);

            CREATE TABLE IF NOT EXISTS agents (
                name TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                system_prompt TEXT NOT NULL,
                context TEXT,
                color TEXT,
                tools_json TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cost_daily (
                date TEXT PRIMARY KEY,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0.0,
                calls INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                importance REAL NOT NULL DEFAULT 0.5,
                created_at TEXT NOT NULL
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                content, content='memories', content_rowid='id'
            );
            CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
                INSERT INTO memories_fts(rowid, content) VALUES (new.id, new.content);
            END;
            CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
                INSERT INTO memories_fts(memories_fts, rowid, content) VALUES('delete', old.id, old.content);
            END;

            CREATE TABLE IF NOT EXISTS checkpoints (
                session_id INTEGER NOT NULL REFERENCES sessions(id),
                checkpoint_num INTEGER NOT NULL,
                from_msg_id INTEGER NOT NULL,
                to_msg_id INTEGER NOT NULL,
                messages_compressed INTEGER NOT NULL,
                summary TEXT NOT NULL,
                key_facts TEXT NOT NULL DEFAULT '',
                original_tokens INTEGER NOT NULL,
                compressed_tokens INTEGER NOT NULL,
                cost REAL NOT NULL DEFAULT 0.0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, checkpoint_num)
            );

            CREATE TABLE IF NOT EXISTS semantic_nodes (
                id INTEGER PRIMARY KEY,
                type TEXT NOT NULL,
                essence TEXT NOT NULL,
                embedding_blob BLOB NOT NULL,
                creator_id TEXT NOT NULL,
                context_id TEXT NOT NULL,
                importance REAL NOT NULL DEFAULT 0.5,
                created_at TEXT NOT NULL,
                last_accessed TEXT NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS semantic_relations (
                from_id INTEGER NOT NULL,
                to_id INTEGER NOT NULL,
                strength REAL NOT NULL,
                relation_type TEXT NOT NULL,
                PRIMARY KEY (from_id, to_id)
            );
            ",
        )?;
        Ok(())
    }

    // ---- sessions ----

    pub fn create_session(&self, user_name: &str) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (user_name, started_at) VALUES (?1, ?2)",
            params![user_name, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn end_session(&self, session_id: i64, total_cost: f64, total_messages: i64) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET ended_at = ?1, total_cost = ?2, total_messages = ?3 WHERE id = ?4",
            params![Utc::now().to_rfc3339(), total_cost, total_messages, session_id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<SessionRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, user_name, started_at, ended_at, total_cost, total_messages FROM sessions WHERE id = ?1",
            params![session_id],
            Self::row_to_session,
        )
        .optional()
        .map_err(PersistenceError::from)
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
        let started_at: String = row.get(2)?;
        let ended_at: Option<String> = row.get(3)?;
        Ok(SessionRecord {
            id: row.get(0)?,
            user_name: row.get(1)?,
            started_at: parse_ts(&started_at),
            ended_at: ended_at.as_deref().map(parse_ts),
            total_cost: row.get(4)?,
            total_messages: row.get(5)?,
        })
    }

    // ---- messages ----

    /// Insert a message, returning its new id. Message inserts are
    /// serialized by the hot mutex, so `messages` row order matches logical
    /// conversation order for a given session (§5 ordering guarantee).
    #[allow(clippy::too_many_arguments)]
    pub fn save_message(
        &self,
        session_id: i64,
        role: &str,
        content: &str,
        parent_id: Option<i64>,
        tokens_in: usize,
        tokens_out: usize,
    ) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        if let Some(parent) = parent_id {
            let parent_exists: Option<i64> = conn
                .query_row("SELECT id FROM messages WHERE id = ?1", params![parent], |r| r.get(0))
                .optional()?;
            if parent_exists.is_none() {
                return Err(PersistenceError {
                    message: format!("parent message {} does not exist", parent),
                });
            }
        }
        conn.execute(
            "INSERT INTO messages (session_id, role, content, timestamp, parent_id, tokens_in, tokens_out)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session_id,
                role,
                content,
                Utc::now().to_rfc3339(),
                parent_id,
                tokens_in as i64,
                tokens_out as i64
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn load_recent_messages(&self, session_id: i64, limit: usize) -> Result<Vec<MessageRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, role, content, timestamp, parent_id, tokens_in, tokens_out
             FROM messages WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows: Vec<MessageRecord> = stmt
            .query_map(params![session_id, limit as i64], Self::row_to_message)?
            .collect::<Result<_, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    pub fn load_messages_range(
        &self,
        session_id: i64,
        from_id: i64,
        to_id: i64,
    ) -> Result<Vec<MessageRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, role, content, timestamp, parent_id, tokens_in, tokens_out
             FROM messages WHERE session_id = ?1 AND id BETWEEN ?2 AND ?3 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id, from_id, to_id], Self::row_to_message)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<MessageRecord> {
        let timestamp: String = row.get(4)?;
        Ok(MessageRecord {
            id: row.get(0)?,
            session_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            timestamp: parse_ts(&timestamp),
            parent_id: row.get(5)?,
            tokens_in: row.get::<_, i64>(6)? as usize,
            tokens_out: row.get::<_, i64>(7)? as usize,
        })
    }

    // ---- agents ----

    pub fn upsert_agent(&self, record: &AgentRecord) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agents (name, role, system_prompt, context, color, tools_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                role = excluded.role,
                system_prompt = excluded.system_prompt,
                context = excluded.context,
                color = excluded.color,
                tools_json = excluded.tools_json",
            params![
                record.name,
                record.role,
                record.system_prompt,
                record.context,
                record.color,
                record.tools_json
            ],
        )?;
        Ok(())
    }

    pub fn load_agents(&self) -> Result<Vec<AgentRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name, role, system_prompt, context, color, tools_json FROM agents")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AgentRecord {
                    name: row.get(0)?,
                    role: row.get(1)?,
                    system_prompt: row.get(2)?,
                    context: row.get(3)?,
                    color: row.get(4)?,
                    tools_json: row.get(5)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    // ---- preferences ----

    pub fn set_preference(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_preference(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT value FROM preferences WHERE key = ?1", params![key], |r| r.get(0))
            .optional()
            .map_err(PersistenceError::from)
    }

    // ---- cost_daily ----

    pub fn upsert_cost_daily(&self, rollup: &CostDailyRecord) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cost_daily (date, input_tokens, output_tokens, cost, calls)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(date) DO UPDATE SET
                input_tokens = input_tokens + excluded.input_tokens,
                output_tokens = output_tokens + excluded.output_tokens,
                cost = cost + excluded.cost,
                calls = calls + excluded.calls",
            params![rollup.date, rollup.input_tokens, rollup.output_tokens, rollup.cost, rollup.calls],
        )?;
        Ok(())
    }

    pub fn get_cost_daily(&self, date: &str) -> Result<Option<CostDailyRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT date, input_tokens, output_tokens, cost, calls FROM cost_daily WHERE date = ?1",
            params![date],
            |row| {
                Ok(CostDailyRecord {
                    date: row.get(0)?,
                    input_tokens: row.get(1)?,
                    output_tokens: row.get(2)?,
                    cost: row.get(3)?,
                    calls: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(PersistenceError::from)
    }

    // ---- memories ----

    pub fn save_memory(&self, content: &str, importance: f64) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO memories (content, importance, created_at) VALUES (?1, ?2, ?3)",
            params![content, importance, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Full-text search over memory content via the FTS5 shadow table,
    /// ranked by recency among matches.
    pub fn search_memories(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.content, m.importance, m.created_at
             FROM memories_fts f JOIN memories m ON m.id = f.rowid
             WHERE memories_fts MATCH ?1 ORDER BY m.id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![query, limit as i64], Self::row_to_memory)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
        let created_at: String = row.get(3)?;
        Ok(MemoryRecord {
            id: row.get(0)?,
            content: row.get(1)?,
            importance: row.get(2)?,
            created_at: parse_ts(&created_at),
        })
    }

    // ---- checkpoints ----

    pub fn save_checkpoint(&self, record: &CheckpointRecord) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO checkpoints
                (session_id, checkpoint_num, from_msg_id, to_msg_id, messages_compressed,
                 summary, key_facts, original_tokens, compressed_tokens, cost, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.session_id,
                record.checkpoint_num,
                record.from_msg_id,
                record.to_msg_id,
                record.messages_compressed,
                record.summary,
                record.key_facts,
                record.original_tokens,
                record.compressed_tokens,
                record.cost,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_checkpoint(&self, session_id: i64, checkpoint_num: i64) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM checkpoints WHERE session_id = ?1 AND checkpoint_num = ?2",
            params![session_id, checkpoint_num],
        )?;
        Ok(())
    }

    pub fn load_checkpoints(&self, session_id: i64) -> Result<Vec<CheckpointRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, checkpoint_num, from_msg_id, to_msg_id, messages_compressed,
                    summary, key_facts, original_tokens, compressed_tokens, cost, created_at
             FROM checkpoints WHERE session_id = ?1 ORDER BY checkpoint_num ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::row_to_checkpoint)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    fn row_to_checkpoint(row: &rusqlite::Row) -> rusqlite::Result<CheckpointRecord> {
        let created_at: String = row.get(10)?;
        Ok(CheckpointRecord {
            session_id: row.get(0)?,
            checkpoint_num: row.get(1)?,
            from_msg_id: row.get(2)?,
            to_msg_id: row.get(3)?,
            messages_compressed: row.get(4)?,
            summary: row.get(5)?,
            key_facts: row.get(6)?,
            original_tokens: row.get(7)?,
            compressed_tokens: row.get(8)?,
            cost: row.get(9)?,
            created_at: parse_ts(&created_at),
        })
    }

    // ---- semantic fabric write-through ----

    pub fn save_semantic_node(&self, record: &SemanticNodeRecord) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO semantic_nodes
                (id, type, essence, embedding_blob, creator_id, context_id, importance,
                 created_at, last_accessed, access_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                essence = excluded.essence,
                embedding_blob = excluded.embedding_blob,
                importance = excluded.importance,
                last_accessed = excluded.last_accessed,
                access_count = excluded.access_count",
            params![
                record.id,
                record.node_type,
                record.essence,
                record.embedding_blob,
                record.creator_id,
                record.context_id,
                record.importance,
                record.created_at.to_rfc3339(),
                record.last_accessed.to_rfc3339(),
                record.access_count,
            ],
        )?;
        Ok(())
    }

    pub fn load_semantic_node(&self, id: i64) -> Result<Option<SemanticNodeRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, type, essence, embedding_blob, creator_id, context_id, importance,
                    created_at, last_accessed, access_count
             FROM semantic_nodes WHERE id = ?1",
            params![id],
            Self::row_to_semantic_node,
        )
        .optional()
        .map_err(PersistenceError::from)
    }

    pub fn load_all_semantic_nodes(&self) -> Result<Vec<SemanticNodeRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, type, essence, embedding_blob, creator_id, context_id, importance,
                    created_at, last_accessed, access_count
             FROM semantic_nodes",
        )?;
        let rows = stmt.query_map([], Self::row_to_semantic_node)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    fn row_to_semantic_node(row: &rusqlite::Row) -> rusqlite::Result<SemanticNodeRecord> {
        let created_at: String = row.get(7)?;
        let last_accessed: String = row.get(8)?;
        Ok(SemanticNodeRecord {
            id: row.get(0)?,
            node_type: row.get(1)?,
            essence: row.get(2)?,
            embedding_blob: row.get(3)?,
            creator_id: row.get(4)?,
            context_id: row.get(5)?,
            importance: row.get(6)?,
            created_at: parse_ts(&created_at),
            last_accessed: parse_ts(&last_accessed),
            access_count: row.get(9)?,
        })
    }

    pub fn save_semantic_relation(&self, record: &SemanticRelationRecord) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO semantic_relations (from_id, to_id, strength, relation_type)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(from_id, to_id) DO UPDATE SET
                strength = excluded.strength,
                relation_type = excluded.relation_type",
            params![record.from_id, record.to_id, record.strength, record.relation_type],
        )?;
        Ok(())
    }

    pub fn load_semantic_relations(&self, from_id: i64) -> Result<Vec<SemanticRelationRecord>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT from_id, to_id, strength, relation_type FROM semantic_relations WHERE from_id = ?1")?;
        let rows = stmt
            .query_map(params![from_id], |row| {
                Ok(SemanticRelationRecord {
                    from_id: row.get(0)?,
                    to_id: row.get(1)?,
                    strength: row.get(2)?,
                    relation_type: row.get(3)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trip_preserves_fields() {
        let db = Persistence::open_in_memory().unwrap();
        let session_id = db.create_session("alice").unwrap();
        let first = db.save_message(session_id, "user", "hello", None, 3, 0).unwrap();
        let _second = db.save_message(session_id, "assistant", "hi there", Some(first), 0, 4).unwrap();

        let recent = db.load_recent_messages(session_id, 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "hello");
        assert_eq!(recent[0].role, "user");
        assert_eq!(recent[1].parent_id, Some(first));
        assert!(recent[1].timestamp >= recent[0].timestamp);
    }

    #[test]
    fn save_message_rejects_missing_parent() {
        let db = Persistence::open_in_memory().unwrap();
        let session_id = db.create_session("alice").unwrap();
        let err = db.save_message(session_id, "user", "orphan", Some(999), 0, 0);
        assert!(err.is_err());
    }

    #[test]
    fn agent_upsert_is_idempotent_by_name() {
        let db = Persistence::open_in_memory().unwrap();
        db.upsert_agent(&AgentRecord {
            name: "ali".to_string(),
            role: "orchestrator".to_string(),
            system_prompt: "v1".to_string(),
            context: None,
            color: None,
            tools_json: "[]".to_string(),
        })
        .unwrap();
        db.upsert_agent(&AgentRecord {
            name: "ali".to_string(),
            role: "orchestrator".to_string(),
            system_prompt: "v2".to_string(),
            context: None,
            color: None,
            tools_json: "[]".to_string(),
        })
        .unwrap();

        let agents = db.load_agents().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].system_prompt, "v2");
    }

    #[test]
    fn cost_daily_upsert_accumulates() {
        let db = Persistence::open_in_memory().unwrap();
        let row = CostDailyRecord {
            date: "2026-01-01".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            cost: 0.01,
            calls: 1,
        };
        db.upsert_cost_daily(&row).unwrap();
        db.upsert_cost_daily(&row).unwrap();

        let loaded = db.get_cost_daily("2026-01-01").unwrap().unwrap();
        assert_eq!(loaded.calls, 2);
        assert_eq!(loaded.input_tokens, 20);
        assert!((loaded.cost - 0.02).abs() < 1e-9);
    }

    #[test]
    fn memory_search_finds_matching_content() {
        let db = Persistence::open_in_memory().unwrap();
        db.save_memory("the user prefers dark mode", 0.7).unwrap();
        db.save_memory("unrelated note about lunch", 0.2).unwrap();

        let hits = db.search_memories("dark", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("dark mode"));
    }

    #[test]
    fn checkpoints_preserve_insertion_order_by_num() {
        let db = Persistence::open_in_memory().unwrap();
        let session_id = db.create_session("alice").unwrap();
        for n in 1..=3 {
            db.save_checkpoint(&CheckpointRecord {
                session_id,
                checkpoint_num: n,
                from_msg_id: n * 10,
                to_msg_id: n * 10 + 9,
                messages_compressed: 10,
                summary: format!("summary {}", n),
                key_facts: String::new(),
                original_tokens: 1000,
                compressed_tokens: 100,
                cost: 0.001,
                created_at: Utc::now(),
            })
            .unwrap();
        }

        let loaded = db.load_checkpoints(session_id).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].checkpoint_num, 1);
        assert_eq!(loaded[2].checkpoint_num, 3);
    }

    #[test]
    fn semantic_node_round_trips_embedding_blob() {
        let db = Persistence::open_in_memory().unwrap();
        let now = Utc::now();
        db.save_semantic_node(&SemanticNodeRecord {
            id: 42,
            node_type: "concept".to_string(),
            essence: "rust ownership".to_string(),
            embedding_blob: vec![1, 2, 3, 4],
            creator_id: "analyst".to_string(),
            context_id: "default".to_string(),
            importance: 0.5,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        })
        .unwrap();

        let loaded = db.load_semantic_node(42).unwrap().unwrap();
        assert_eq!(loaded.embedding_blob, vec![1, 2, 3, 4]);
        assert_eq!(loaded.essence, "rust ownership");
    }
}
