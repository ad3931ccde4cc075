//! Per-agent FIFO message queues with thread/ancestor resolution.
//!
//! Every agent gets its own queue so a slow consumer never blocks delivery
//! to anyone else. Threading is modeled the same way the rest of the kernel
//! threads conversation turns (see [`crate::kernel::persistence::MessageRecord::parent_id`]):
//! each posted message can optionally name a `parent_id`, and
//! [`MessageBus::thread_of`] walks `parent_id` links back to the root.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// A single bus message.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub id: i64,
    pub from: String,
    pub to: String,
    pub content: String,
    pub parent_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Per-agent FIFO queues plus a flat log used for thread resolution.
pub struct MessageBus {
    queues: RwLock<HashMap<String, Vec<BusMessage>>>,
    all: RwLock<HashMap<i64, BusMessage>>,
    next_id: AtomicI64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self { queues: RwLock::new(HashMap::new()), all: RwLock::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }

    /// Post a message to `to`'s queue, returning the new message's id.
    pub async fn post(&self, from: &str, to: &str, content: &str, parent_id: Option<i64>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = BusMessage {
            id,
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
            parent_id,
            timestamp: Utc::now(),
        };
        self.all.write().await.insert(id, message.clone());
        self.queues.write().await.entry(to.to_string()).or_default().push(message);
        id
    }

    /// Broadcast to every id in `recipients`, sharing one `parent_id` chain
    /// root but minting a distinct message id per recipient so each queue's
    /// FIFO order is independent.
    pub async fn broadcast(&self, from: &str, recipients: &[String], content: &str, parent_id: Option<i64>) -> Vec<i64> {
        let mut ids = Vec::with_capacity(recipients.len());
        for to in recipients {
            ids.push(self.post(from, to, content, parent_id).await);
        }
        ids
    }

    /// Drain and return every message currently queued for `agent_id`, in
    /// FIFO order.
    pub async fn drain(&self, agent_id: &str) -> Vec<BusMessage> {
        self.queues.write().await.remove(agent_id).unwrap_or_default()
    }

    /// Peek at a recipient's queue without consuming it.
    pub async fn peek(&self, agent_id: &str) -> Vec<BusMessage> {
        self.queues.read().await.get(agent_id).cloned().unwrap_or_default()
    }

    pub async fn pending_count(&self, agent_id: &str) -> usize {
        self.queues.read().await.get(agent_id).map(|q| q.len()).unwrap_or(0)
    }

    /// Walk `parent_id` links from `message_id` back to the thread's root,
    /// returning the full chain oldest-first.
    pub async fn thread_of(&self, message_id: i64) -> Vec<BusMessage> {
        let all = self.all.read().await;
        let mut chain = Vec::new();
        let mut current = all.get(&message_id).cloned();
        while let Some(message) = current {
            let parent = message.parent_id;
            chain.push(message);
            current = parent.and_then(|id| all.get(&id).cloned());
        }
        chain.reverse();
        chain
    }
}
