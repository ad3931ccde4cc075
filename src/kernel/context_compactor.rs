//! Session-scoped context compaction with durable checkpoints.
//!
//! Expands [`SelfCompressionStrategy`](crate::kernel::context_strategy::SelfCompressionStrategy)'s
//! "LLM writes its own save file" idea with two things a single in-memory
//! strategy can't do on its own: persist each compaction as a `checkpoints`
//! row (so a restarted process can rebuild context without replaying the
//! whole [`ThoughtChain`]), and cap how many checkpoints accumulate by
//! merging the oldest two once the cap is hit rather than growing without
//! bound.

use std::error::Error;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::kernel::client_wrapper::Role;
use crate::kernel::llm_session::LLMSession;
use crate::kernel::persistence::{CheckpointRecord, Persistence};
use crate::kernel::thought_chain::{ThoughtChain, ThoughtType};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

const COMPRESSION_PROMPT: &str = "\
You are compressing your conversation memory into a structured save file. \
Write a concise summary covering:\n\
1. Key Findings\n\
2. Decisions Made\n\
3. Current Task State\n\
4. Open Questions\n\
5. Next Steps\n\n\
Be concise but preserve all critical information.";

/// Token-threshold-triggered compactor that writes a `checkpoints` row to
/// [`Persistence`] on every compaction and merges the oldest two checkpoints
/// once `max_checkpoints` is exceeded.
pub struct ContextCompactor {
    persistence: Arc<Persistence>,
    session_id: i64,
    token_threshold: usize,
    max_checkpoints: usize,
    last_compacted_msg_id: AtomicI64,
    next_checkpoint_num: AtomicI64,
}

impl ContextCompactor {
    pub fn new(persistence: Arc<Persistence>, session_id: i64, token_threshold: usize, max_checkpoints: usize) -> Self {
        Self {
            persistence,
            session_id,
            token_threshold,
            max_checkpoints: max_checkpoints.max(1),
            last_compacted_msg_id: AtomicI64::new(0),
            next_checkpoint_num: AtomicI64::new(1),
        }
    }

    /// Concatenated summaries of every checkpoint on record, oldest first,
    /// suitable for injecting as a system message into a freshly started
    /// session so it starts with prior context instead of a blank slate.
    pub fn build_context(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let checkpoints = self.persistence.load_checkpoints(self.session_id)?;
        if checkpoints.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::from("Prior session context, compressed across checkpoints:\n\n");
        for checkpoint in &checkpoints {
            out.push_str(&format!("[checkpoint {}] {}\n\n", checkpoint.checkpoint_num, checkpoint.summary));
        }
        Ok(out)
    }

    pub fn checkpoint_count(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.persistence.load_checkpoints(self.session_id)?.len())
    }

    /// Merge the two oldest checkpoints into one, keeping the cap from
    /// growing without bound. The merged row keeps the older checkpoint's
    /// `checkpoint_num` and `from_msg_id`, the newer one's `to_msg_id`, and
    /// concatenates both summaries.
    fn merge_oldest_if_over_cap(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut checkpoints = self.persistence.load_checkpoints(self.session_id)?;
        if checkpoints.len() <= self.max_checkpoints {
            return Ok(());
        }
        checkpoints.sort_by_key(|c| c.checkpoint_num);
        let oldest = checkpoints[0].clone();
        let second = checkpoints[1].clone();

        let merged = CheckpointRecord {
            session_id: self.session_id,
            checkpoint_num: oldest.checkpoint_num,
            from_msg_id: oldest.from_msg_id,
            to_msg_id: second.to_msg_id,
            messages_compressed: oldest.messages_compressed + second.messages_compressed,
            summary: format!("{}\n---\n{}", oldest.summary, second.summary),
            key_facts: format!("{}\n{}", oldest.key_facts, second.key_facts),
            original_tokens: oldest.original_tokens + second.original_tokens,
            compressed_tokens: oldest.compressed_tokens + second.compressed_tokens,
            cost: oldest.cost + second.cost,
            created_at: Utc::now(),
        };

        self.persistence.delete_checkpoint(self.session_id, oldest.checkpoint_num)?;
        self.persistence.delete_checkpoint(self.session_id, second.checkpoint_num)?;
        self.persistence.save_checkpoint(&merged)?;
        Ok(())
    }
}

#[async_trait]
impl crate::kernel::context_strategy::ContextStrategy for ContextCompactor {
    fn should_compact(&self, session: &LLMSession) -> bool {
        session.estimated_history_tokens() >= self.token_threshold
    }

    async fn compact(
        &self,
        session: &mut LLMSession,
        thought_chain: &Option<Arc<RwLock<ThoughtChain>>>,
        agent_id: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let messages_before = session.get_conversation_history().len();
        let original_tokens = session.estimated_history_tokens();

        let response = session
            .send_message(Role::User, COMPRESSION_PROMPT.to_string(), None, None)
            .await
            .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(std::io::Error::other(e.to_string())) })?;
        let summary = response.content.to_string();

        if let Some(chain) = thought_chain {
            let mut chain = chain.write().await;
            chain.append_with_refs(agent_id, ThoughtType::Compression, &summary, vec![])?;
        }

        session.clear_history();
        session.inject_message(Role::System, summary.clone());

        let from_msg_id = self.last_compacted_msg_id.load(Ordering::SeqCst) + 1;
        let to_msg_id = from_msg_id + messages_before as i64 - 1;
        self.last_compacted_msg_id.store(to_msg_id, Ordering::SeqCst);
        let checkpoint_num = self.next_checkpoint_num.fetch_add(1, Ordering::SeqCst);

        self.persistence.save_checkpoint(&CheckpointRecord {
            session_id: self.session_id,
            checkpoint_num,
            from_msg_id,
            to_msg_id,
            messages_compressed: messages_before as i64,
            summary,
            key_facts: String::new(),
            original_tokens: original_tokens as i64,
            compressed_tokens: session.estimated_history_tokens() as i64,
            cost: 0.0,
            created_at: Utc::now(),
        })?;

        self.merge_oldest_if_over_cap()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "ContextCompactor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::client_wrapper::{ClientWrapper, Message, ToolDefinition};
    use crate::kernel::context_strategy::ContextStrategy;
    use std::sync::Arc as StdArc;

    struct StubClient;

    #[async_trait::async_trait]
    impl ClientWrapper for StubClient {
        async fn send_message(
            &self,
            _messages: &[Message],
            _tools: Option<Vec<ToolDefinition>>,
        ) -> Result<Message, Box<dyn Error>> {
            Ok(Message {
                role: Role::Assistant,
                content: StdArc::from("1. Findings: none yet\n2. Decisions: none"),
                tool_calls: vec![],
            })
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn new_session() -> LLMSession {
        LLMSession::new(StdArc::new(StubClient), String::new(), 1_000)
    }

    #[tokio::test]
    async fn compact_writes_a_checkpoint_and_clears_history() {
        let persistence = StdArc::new(Persistence::open_in_memory().unwrap());
        let session_id = persistence.create_session("test").unwrap();
        let compactor = ContextCompactor::new(StdArc::clone(&persistence), session_id, 10, 5);

        let mut session = new_session();
        session.send_message(Role::User, "hello".to_string(), None, None).await.unwrap();

        compactor.compact(&mut session, &None, "agent-1").await.unwrap();

        assert_eq!(compactor.checkpoint_count().unwrap(), 1);
        assert_eq!(session.get_conversation_history().len(), 1); // just the injected system message
    }

    #[tokio::test]
    async fn build_context_concatenates_checkpoints_in_order() {
        let persistence = StdArc::new(Persistence::open_in_memory().unwrap());
        let session_id = persistence.create_session("test").unwrap();
        let compactor = ContextCompactor::new(StdArc::clone(&persistence), session_id, 10, 5);

        for _ in 0..2 {
            let mut session = new_session();
            session.send_message(Role::User, "hello".to_string(), None, None).await.unwrap();
            compactor.compact(&mut session, &None, "agent-1").await.unwrap();
        }

        let context = compactor.build_context().unwrap();
        assert!(context.contains("checkpoint 1"));
        assert!(context.contains("checkpoint 2"));
    }

    #[tokio::test]
    async fn merges_oldest_checkpoints_once_cap_exceeded() {
        let persistence = StdArc::new(Persistence::open_in_memory().unwrap());
        let session_id = persistence.create_session("test").unwrap();
        let compactor = ContextCompactor::new(StdArc::clone(&persistence), session_id, 10, 2);

        for _ in 0..3 {
            let mut session = new_session();
            session.send_message(Role::User, "hello".to_string(), None, None).await.unwrap();
            compactor.compact(&mut session, &None, "agent-1").await.unwrap();
        }

        // cap is 2: after the 3rd compaction the oldest two should have merged.
        assert_eq!(compactor.checkpoint_count().unwrap(), 2);
    }

    #[test]
    fn should_compact_triggers_on_absolute_token_threshold() {
        let persistence = StdArc::new(Persistence::open_in_memory().unwrap());
        let session_id = persistence.create_session("test").unwrap();
        let compactor = ContextCompactor::new(persistence, session_id, 5, 5);
        let session = new_session();
        // Fresh session has zero history tokens, below the threshold.
        assert!(!compactor.should_compact(&session));
    }
}
