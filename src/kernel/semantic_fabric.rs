//! Sharded in-memory semantic graph shared across agents.
//!
//! Nodes (`SemanticNode`) are keyed by a synthetic [`SemanticId`] that packs
//! a millisecond timestamp, a type tag, and a monotonic counter into a
//! single `u64` so ids sort roughly by creation order without a central
//! sequence generator. Storage is sharded the way `dashmap` itself shards
//! internally, but at a coarser grain and with each shard's mutex padded to
//! a cache line — the fabric is read far more than it's written (every
//! agent turn does a similarity search; writes happen once per finding) so
//! avoiding false sharing between shards under concurrent reads is worth
//! the extra bytes.
//!
//! Optionally write-through to [`Persistence`] so the graph survives a
//! restart: every `insert`/`relate` call durably mirrors the in-memory
//! shard, following the same warn-and-continue convention `Orchestrator`
//! uses for message persistence — a durability failure never fails the
//! caller's turn.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::kernel::persistence::{Persistence, SemanticNodeRecord, SemanticRelationRecord};

/// Coarse type tag packed into the top byte of a [`SemanticId`]'s low 24 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SemanticType {
    Concept = 0,
    Entity = 1,
    Relation = 2,
    Intent = 3,
    Agent = 4,
    Space = 5,
    Event = 6,
    Feeling = 7,
    Memory = 8,
    Pattern = 9,
}

impl SemanticType {
    fn from_tag(tag: u8) -> SemanticType {
        match tag {
            1 => SemanticType::Entity,
            2 => SemanticType::Relation,
            3 => SemanticType::Intent,
            4 => SemanticType::Agent,
            5 => SemanticType::Space,
            6 => SemanticType::Event,
            7 => SemanticType::Feeling,
            8 => SemanticType::Memory,
            9 => SemanticType::Pattern,
            _ => SemanticType::Concept,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Concept => "concept",
            SemanticType::Entity => "entity",
            SemanticType::Relation => "relation",
            SemanticType::Intent => "intent",
            SemanticType::Agent => "agent",
            SemanticType::Space => "space",
            SemanticType::Event => "event",
            SemanticType::Feeling => "feeling",
            SemanticType::Memory => "memory",
            SemanticType::Pattern => "pattern",
        }
    }
}

/// 64-bit identifier: bits 63..24 are a millisecond timestamp (40 bits,
/// good until the year 36812), bits 23..16 are the [`SemanticType`] tag,
/// bits 15..0 are a per-millisecond monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticId(pub u64);

impl SemanticId {
    fn new(timestamp_ms: u64, kind: SemanticType, counter: u16) -> SemanticId {
        let ts = timestamp_ms & 0xFF_FFFF_FFFF;
        SemanticId((ts << 24) | ((kind as u64) << 16) | counter as u64)
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.0 >> 24
    }

    pub fn kind(&self) -> SemanticType {
        SemanticType::from_tag(((self.0 >> 16) & 0xFF) as u8)
    }

    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}

/// A single node in the fabric: a piece of distilled meaning plus the
/// embedding used for similarity search and bookkeeping for eviction.
#[derive(Debug, Clone)]
pub struct SemanticNode {
    pub id: SemanticId,
    pub kind: SemanticType,
    pub essence: String,
    pub embedding: Vec<f32>,
    pub creator_id: String,
    pub context_id: String,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
}

/// A directed, weighted edge between two nodes, labeled with a free-form
/// relation type (e.g. `"supports"`, `"contradicts"`, `"derived_from"`).
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticRelation {
    pub from: SemanticId,
    pub to: SemanticId,
    pub strength: f64,
    pub relation_type: String,
}

struct Shard {
    nodes: RwLock<HashMap<SemanticId, SemanticNode>>,
    relations: RwLock<Vec<SemanticRelation>>,
}

/// Pads a shard's lock to its own cache line so concurrent readers of
/// neighboring shards don't thrash the same cache line via false sharing.
#[repr(align(64))]
struct PaddedShard(Shard);

struct IdGenerator {
    last_ms: Mutex<u64>,
    counter: AtomicU16,
}

impl IdGenerator {
    fn new() -> Self {
        Self { last_ms: Mutex::new(0), counter: AtomicU16::new(0) }
    }

    fn next(&self, kind: SemanticType) -> SemanticId {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
        let mut last = self.last_ms.lock().unwrap();
        let counter = if now_ms != *last {
            *last = now_ms;
            self.counter.store(0, Ordering::SeqCst);
            0
        } else {
            self.counter.fetch_add(1, Ordering::SeqCst) + 1
        };
        SemanticId::new(now_ms, kind, counter)
    }
}

/// Flatten an embedding into little-endian bytes for the `embedding_blob`
/// column; the inverse of [`blob_to_embedding`].
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for x in embedding {
        blob.extend_from_slice(&x.to_le_bytes());
    }
    blob
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

/// Sharded semantic store. The default shard count (16) matches
/// [`crate::kernel::config::KernelConfig::fabric_shard_count`].
pub struct SemanticFabric {
    shards: Vec<PaddedShard>,
    shard_count: usize,
    ids: IdGenerator,
    /// Soft per-shard cap; once exceeded, the lowest-importance node in the
    /// shard is evicted on the next insert. Open question resolved in
    /// DESIGN.md: default 4096 nodes/shard, tunable via
    /// [`SemanticFabric::with_eviction_cap`].
    eviction_cap: usize,
    persistence: Option<Arc<Persistence>>,
}

impl SemanticFabric {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| PaddedShard(Shard { nodes: RwLock::new(HashMap::new()), relations: RwLock::new(Vec::new()) }))
            .collect();
        Self { shards, shard_count, ids: IdGenerator::new(), eviction_cap: 4096, persistence: None }
    }

    pub fn with_eviction_cap(mut self, cap: usize) -> Self {
        self.eviction_cap = cap;
        self
    }

    /// Mirror every `insert`/`relate` to `persistence` so the graph survives
    /// a restart. Reads (`get`, `search_similar`, `nodes_by_context`) remain
    /// served purely from the in-memory shards; rehydration from
    /// `persistence.load_all_semantic_nodes()` is the host application's job
    /// at startup.
    pub fn with_persistence(mut self, persistence: Arc<Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn shard_for(&self, id: &SemanticId) -> &Shard {
        let idx = (id.0 as usize) % self.shard_count;
        &self.shards[idx].0
    }

    /// Insert a new node, returning its freshly minted id. If the owning
    /// shard is over [`SemanticFabric::eviction_cap`], evicts the
    /// lowest-importance node in that shard first.
    pub fn insert(
        &self,
        kind: SemanticType,
        essence: impl Into<String>,
        embedding: Vec<f32>,
        creator_id: impl Into<String>,
        context_id: impl Into<String>,
        importance: f64,
    ) -> SemanticId {
        let id = self.ids.next(kind);
        let node = SemanticNode {
            id,
            kind,
            essence: essence.into(),
            embedding,
            creator_id: creator_id.into(),
            context_id: context_id.into(),
            importance,
            created_at: Utc::now(),
            last_accessed: Utc::now(),
            access_count: 0,
        };
        let shard = self.shard_for(&id);
        {
            let mut nodes = shard.nodes.write().unwrap();
            if nodes.len() >= self.eviction_cap {
                if let Some(weakest) = nodes.values().min_by(|a, b| {
                    a.importance.partial_cmp(&b.importance).unwrap_or(std::cmp::Ordering::Equal)
                }) {
                    let weakest_id = weakest.id;
                    nodes.remove(&weakest_id);
                }
            }
            nodes.insert(id, node.clone());
        }

        if let Some(persistence) = &self.persistence {
            let record = SemanticNodeRecord {
                id: node.id.as_i64(),
                node_type: node.kind.as_str().to_string(),
                essence: node.essence.clone(),
                embedding_blob: embedding_to_blob(&node.embedding),
                creator_id: node.creator_id.clone(),
                context_id: node.context_id.clone(),
                importance: node.importance,
                created_at: node.created_at,
                last_accessed: node.last_accessed,
                access_count: node.access_count as i64,
            };
            if let Err(e) = persistence.save_semantic_node(&record) {
                log::warn!("failed to persist semantic node {}: {e}", node.id.as_i64());
            }
        }

        id
    }

    pub fn get(&self, id: &SemanticId) -> Option<SemanticNode> {
        let shard = self.shard_for(id);
        let mut nodes = shard.nodes.write().unwrap();
        if let Some(node) = nodes.get_mut(id) {
            node.last_accessed = Utc::now();
            node.access_count += 1;
            return Some(node.clone());
        }
        None
    }

    /// Record or update a directed, typed relation. Idempotent on `(from,
    /// to)`: a second call with the same pair updates `strength` and
    /// `relation_type` in place rather than accumulating a duplicate edge.
    pub fn relate(&self, from: SemanticId, to: SemanticId, strength: f64, relation_type: impl Into<String>) {
        let relation_type = relation_type.into();
        let shard = self.shard_for(&from);
        {
            let mut relations = shard.relations.write().unwrap();
            if let Some(existing) = relations.iter_mut().find(|r| r.from == from && r.to == to) {
                existing.strength = strength;
                existing.relation_type = relation_type.clone();
            } else {
                relations.push(SemanticRelation { from, to, strength, relation_type: relation_type.clone() });
            }
        }

        if let Some(persistence) = &self.persistence {
            let record = SemanticRelationRecord {
                from_id: from.as_i64(),
                to_id: to.as_i64(),
                strength,
                relation_type,
            };
            if let Err(e) = persistence.save_semantic_relation(&record) {
                log::warn!("failed to persist semantic relation {}->{}: {e}", from.as_i64(), to.as_i64());
            }
        }
    }

    pub fn relations_from(&self, id: &SemanticId) -> Vec<SemanticRelation> {
        let shard = self.shard_for(id);
        shard.relations.read().unwrap().iter().filter(|r| r.from == *id).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.0.nodes.read().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-`k` nodes by cosine similarity of `query` against every node's
    /// embedding, scanned across all shards. Linear in node count; fine at
    /// the scale a single terminal session accumulates, and the place to
    /// add an ANN index if that stops being true.
    pub fn search_similar(&self, query: &[f32], k: usize) -> Vec<(SemanticNode, f32)> {
        let mut scored: Vec<(SemanticNode, f32)> = Vec::new();
        for shard in &self.shards {
            let nodes = shard.0.nodes.read().unwrap();
            for node in nodes.values() {
                let score = cosine_similarity(query, &node.embedding);
                scored.push((node.clone(), score));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn nodes_by_context(&self, context_id: &str) -> Vec<SemanticNode> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let nodes = shard.0.nodes.read().unwrap();
            out.extend(nodes.values().filter(|n| n.context_id == context_id).cloned());
        }
        out
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_even_within_the_same_millisecond() {
        let fabric = SemanticFabric::new(4);
        let a = fabric.insert(SemanticType::Concept, "a", vec![1.0], "me", "ctx", 0.5);
        let b = fabric.insert(SemanticType::Concept, "b", vec![1.0], "me", "ctx", 0.5);
        assert_ne!(a, b);
    }

    #[test]
    fn id_round_trips_kind_and_timestamp() {
        let fabric = SemanticFabric::new(4);
        let id = fabric.insert(SemanticType::Pattern, "p", vec![0.0], "me", "ctx", 0.1);
        assert_eq!(id.kind(), SemanticType::Pattern);
        assert!(id.timestamp_ms() > 0);
    }

    #[test]
    fn search_similar_ranks_closest_embedding_first() {
        let fabric = SemanticFabric::new(4);
        fabric.insert(SemanticType::Concept, "far", vec![1.0, 0.0], "me", "ctx", 0.5);
        let close = fabric.insert(SemanticType::Concept, "close", vec![0.0, 1.0], "me", "ctx", 0.5);

        let results = fabric.search_similar(&[0.0, 1.0], 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, close);
    }

    #[test]
    fn get_bumps_access_count_and_last_accessed() {
        let fabric = SemanticFabric::new(4);
        let id = fabric.insert(SemanticType::Entity, "e", vec![0.0], "me", "ctx", 0.5);
        fabric.get(&id);
        fabric.get(&id);
        let node = fabric.get(&id).unwrap();
        assert_eq!(node.access_count, 3);
    }

    #[test]
    fn eviction_cap_drops_lowest_importance_node() {
        let fabric = SemanticFabric::new(1).with_eviction_cap(2);
        let weak = fabric.insert(SemanticType::Concept, "weak", vec![0.0], "me", "ctx", 0.1);
        fabric.insert(SemanticType::Concept, "mid", vec![0.0], "me", "ctx", 0.5);
        fabric.insert(SemanticType::Concept, "strong", vec![0.0], "me", "ctx", 0.9);

        assert_eq!(fabric.len(), 2);
        assert!(fabric.get(&weak).is_none());
    }

    #[test]
    fn relations_are_scoped_to_the_from_node() {
        let fabric = SemanticFabric::new(4);
        let a = fabric.insert(SemanticType::Concept, "a", vec![0.0], "me", "ctx", 0.5);
        let b = fabric.insert(SemanticType::Concept, "b", vec![0.0], "me", "ctx", 0.5);
        fabric.relate(a, b, 0.8, "supports");

        assert_eq!(fabric.relations_from(&a).len(), 1);
        assert!(fabric.relations_from(&b).is_empty());
    }

    #[test]
    fn relate_is_idempotent_on_repeated_pairs() {
        let fabric = SemanticFabric::new(4);
        let a = fabric.insert(SemanticType::Concept, "a", vec![0.0], "me", "ctx", 0.5);
        let b = fabric.insert(SemanticType::Concept, "b", vec![0.0], "me", "ctx", 0.5);

        fabric.relate(a, b, 0.2, "mentions");
        fabric.relate(a, b, 0.9, "supports");

        let relations = fabric.relations_from(&a);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].strength, 0.9);
        assert_eq!(relations[0].relation_type, "supports");
    }

    #[test]
    fn embedding_blob_round_trips() {
        let embedding = vec![0.25_f32, -1.5, 3.0];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&embedding)), embedding);
    }

    #[test]
    fn insert_and_relate_write_through_to_persistence() {
        let persistence = Arc::new(Persistence::open_in_memory().unwrap());
        let fabric = SemanticFabric::new(4).with_persistence(Arc::clone(&persistence));

        let a = fabric.insert(SemanticType::Concept, "a", vec![1.0, 2.0], "me", "ctx", 0.5);
        let b = fabric.insert(SemanticType::Concept, "b", vec![3.0, 4.0], "me", "ctx", 0.5);
        fabric.relate(a, b, 0.7, "supports");

        let stored = persistence.load_semantic_node(a.as_i64()).unwrap().unwrap();
        assert_eq!(stored.essence, "a");
        assert_eq!(blob_to_embedding(&stored.embedding_blob), vec![1.0, 2.0]);

        let relations = persistence.load_semantic_relations(a.as_i64()).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, "supports");
    }
}
