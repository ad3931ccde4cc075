//! Routes a user turn to a target agent and an [`IntentType`]: first a
//! direct-addressee pattern match, then a cheap intent pattern table, then a
//! hand-rolled LRU cache of recent route decisions, and only then a cheap
//! model call as a fallback.
//!
//! The LRU is hand-rolled rather than pulled in as a dependency — it's a
//! handful of lines over a `HashMap` plus a recency vector, and the corpus
//! reaches for a crate only when the crate earns its keep; a fixed-capacity
//! cache with move-to-front-on-hit doesn't.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Mutex;

use crate::kernel::client_wrapper::{ClientWrapper, Message, Role};

/// The coarse intent a user turn maps to, used only internally to drive
/// [`PATTERN_TABLE`] matching and model-response labeling. Callers see
/// [`IntentType`] and `intent_label` on [`RouteDecision`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Intent {
    Question,
    Command,
    Decompose,
    SmallTalk,
    Unknown,
}

impl Intent {
    fn from_label(label: &str) -> Intent {
        match label.trim().to_ascii_lowercase().as_str() {
            "question" => Intent::Question,
            "command" => Intent::Command,
            "decompose" => Intent::Decompose,
            "small_talk" | "smalltalk" => Intent::SmallTalk,
            _ => Intent::Unknown,
        }
    }

    fn as_label(&self) -> &'static str {
        match self {
            Intent::Question => "question",
            Intent::Command => "command",
            Intent::Decompose => "decompose",
            Intent::SmallTalk => "small_talk",
            Intent::Unknown => "unknown",
        }
    }

    /// Only `Decompose` asks for the planner/delegation path; everything
    /// else is a direct message to the routed agent.
    fn as_intent_type(&self) -> IntentType {
        match self {
            Intent::Decompose => IntentType::Delegate,
            _ => IntentType::Message,
        }
    }
}

/// What the orchestrator should do with a routed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentType {
    /// Send the turn to `target_agent` directly.
    Message,
    /// The turn named a specific agent explicitly; switch the conversation
    /// to address them.
    Switch,
    /// Run the turn through the task decomposer and a delegation wave.
    Delegate,
}

/// The outcome of [`IntentRouter::route`]: who should handle the turn, what
/// kind of handling it needs, and how confident/expensive that decision was.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub target_agent: String,
    pub confidence: f64,
    pub intent_label: String,
    pub used_llm: bool,
    pub intent_type: IntentType,
}

/// A single pattern-table rule: if `needle` appears (case-insensitively) in
/// the message, route to `intent` without ever touching a model.
struct PatternRule {
    needle: &'static str,
    intent: Intent,
}

const PATTERN_TABLE: &[PatternRule] = &[
    PatternRule { needle: "?", intent: Intent::Question },
    PatternRule { needle: "please run", intent: Intent::Command },
    PatternRule { needle: "please execute", intent: Intent::Command },
    PatternRule { needle: "break down", intent: Intent::Decompose },
    PatternRule { needle: "break this into", intent: Intent::Decompose },
    PatternRule { needle: "plan out", intent: Intent::Decompose },
    PatternRule { needle: "hello", intent: Intent::SmallTalk },
    PatternRule { needle: "thanks", intent: Intent::SmallTalk },
];

/// Fixed-capacity LRU keyed by the raw message text. Eviction is
/// move-to-front-on-hit over a recency vector — fine at the small
/// capacities (tens to low hundreds of entries) an interactive session
/// needs; a linked-hashmap would only pay off past that.
struct LruCache {
    capacity: usize,
    entries: HashMap<String, RouteDecision>,
    recency: Vec<String>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), recency: Vec::new() }
    }

    fn get(&mut self, key: &str) -> Option<RouteDecision> {
        if let Some(decision) = self.entries.get(key).cloned() {
            self.touch(key);
            Some(decision)
        } else {
            None
        }
    }

    fn put(&mut self, key: String, decision: RouteDecision) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key.clone(), decision);
            self.touch(&key);
            return;
        }
        if self.entries.len() >= self.capacity {
            if !self.recency.is_empty() {
                let oldest = self.recency.remove(0);
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key.clone(), decision);
        self.recency.push(key);
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            let k = self.recency.remove(pos);
            self.recency.push(k);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Four-stage router: addressee pattern match, then intent pattern table,
/// then LRU cache, then a cheap model call as a last resort.
pub struct IntentRouter {
    cache: Mutex<LruCache>,
    last_used: Mutex<Option<String>>,
}

impl IntentRouter {
    pub fn new(cache_capacity: usize) -> Self {
        Self { cache: Mutex::new(LruCache::new(cache_capacity)), last_used: Mutex::new(None) }
    }

    /// Route `message` to a [`RouteDecision`], calling `fallback_client`
    /// only if none of the addressee match, the pattern table, nor the
    /// cache can classify it.
    ///
    /// `known_ids` is the full agent roster, checked for an explicit
    /// `/name`, `hey name`, `name,` or `ask name to ...` prefix before
    /// anything else runs — a turn that names its addressee never needs a
    /// model call to route. When more than one known id matches (ambiguous
    /// phrasing naming two agents), the most recently addressed agent wins
    /// if it's among the matches, else `default_id`, else the first match
    /// in roster order.
    pub async fn route(
        &self,
        message: &str,
        known_ids: &[String],
        default_id: &str,
        fallback_client: &dyn ClientWrapper,
    ) -> Result<RouteDecision, Box<dyn Error>> {
        let trimmed = message.trim();
        let addressees = Self::match_addressees(trimmed, known_ids);
        if !addressees.is_empty() {
            let target = self.break_addressee_tie(&addressees, default_id);
            *self.last_used.lock().unwrap() = Some(target.clone());
            return Ok(RouteDecision {
                target_agent: target,
                confidence: 1.0,
                intent_label: "switch".to_string(),
                used_llm: false,
                intent_type: IntentType::Switch,
            });
        }

        if let Some(mut decision) = self.cache.lock().unwrap().get(message) {
            decision.used_llm = false;
            return Ok(decision);
        }

        if let Some(intent) = Self::match_pattern(message) {
            return Ok(RouteDecision {
                target_agent: default_id.to_string(),
                confidence: 0.8,
                intent_label: intent.as_label().to_string(),
                used_llm: false,
                intent_type: intent.as_intent_type(),
            });
        }

        let intent = self.classify_via_model(message, fallback_client).await?;
        let decision = RouteDecision {
            target_agent: default_id.to_string(),
            confidence: 0.6,
            intent_label: intent.as_label().to_string(),
            used_llm: true,
            intent_type: intent.as_intent_type(),
        };
        self.cache.lock().unwrap().put(message.to_string(), decision.clone());
        Ok(decision)
    }

    /// Every known id an explicit addressee prefix names. A leading `/name`
    /// is treated as unambiguous (at most one match); `hey name`, `name,`
    /// and `ask name to` are scanned against every known id, since more than
    /// one can legitimately match a single message.
    fn match_addressees(trimmed: &str, known_ids: &[String]) -> Vec<String> {
        if let Some(rest) = trimmed.strip_prefix('/') {
            let name = rest.split_whitespace().next().unwrap_or("");
            return known_ids.iter().find(|id| id.as_str() == name).cloned().into_iter().collect();
        }
        let lower = trimmed.to_ascii_lowercase();
        known_ids
            .iter()
            .filter(|id| {
                let id_lower = id.to_ascii_lowercase();
                lower.starts_with(&format!("hey {}", id_lower))
                    || lower.starts_with(&format!("{},", id_lower))
                    || lower.contains(&format!("ask {} to", id_lower))
            })
            .cloned()
            .collect()
    }

    fn break_addressee_tie(&self, matches: &[String], default_id: &str) -> String {
        if matches.len() == 1 {
            return matches[0].clone();
        }
        if let Some(last) = self.last_used.lock().unwrap().clone() {
            if matches.contains(&last) {
                return last;
            }
        }
        if matches.iter().any(|m| m == default_id) {
            return default_id.to_string();
        }
        matches[0].clone()
    }

    fn match_pattern(message: &str) -> Option<Intent> {
        let lower = message.to_ascii_lowercase();
        PATTERN_TABLE.iter().find(|rule| lower.contains(rule.needle)).map(|rule| rule.intent)
    }

    async fn classify_via_model(
        &self,
        message: &str,
        client: &dyn ClientWrapper,
    ) -> Result<Intent, Box<dyn Error>> {
        let prompt = format!(
            "Classify the intent of this message as exactly one of: question, command, \
             decompose, small_talk, unknown. Respond with only the label.\n\nMessage: {}",
            message
        );
        let response = client
            .send_message(
                &[Message { role: Role::User, content: std::sync::Arc::from(prompt.as_str()), tool_calls: vec![] }],
                None,
            )
            .await?;
        Ok(Intent::from_label(&response.content))
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct StubClient {
        label: &'static str,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ClientWrapper for StubClient {
        async fn send_message(
            &self,
            _messages: &[Message],
            _tools: Option<Vec<crate::kernel::client_wrapper::ToolDefinition>>,
        ) -> Result<Message, Box<dyn Error>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Message { role: Role::Assistant, content: Arc::from(self.label), tool_calls: vec![] })
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn stub(label: &'static str) -> StubClient {
        StubClient { label, calls: std::sync::atomic::AtomicUsize::new(0) }
    }

    #[tokio::test]
    async fn pattern_table_catches_obvious_questions_without_a_model_call() {
        let router = IntentRouter::new(10);
        let client = stub("unknown");
        let decision = router.route("what time is it?", &[], "ali", &client).await.unwrap();
        assert_eq!(decision.intent_label, "question");
        assert_eq!(decision.intent_type, IntentType::Message);
        assert_eq!(decision.target_agent, "ali");
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_to_model_and_then_caches_the_result() {
        let router = IntentRouter::new(10);
        let client = stub("decompose");
        let message = "go set up the whole deployment pipeline";

        let first = router.route(message, &[], "ali", &client).await.unwrap();
        assert_eq!(first.intent_type, IntentType::Delegate);
        assert!(first.used_llm);
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let second = router.route(message, &[], "ali", &client).await.unwrap();
        assert_eq!(second.intent_type, IntentType::Delegate);
        assert!(!second.used_llm);
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lru_evicts_oldest_entry_once_capacity_is_exceeded() {
        let router = IntentRouter::new(2);
        let client = stub("command");

        router.route("do the thing alpha", &[], "ali", &client).await.unwrap();
        router.route("do the thing beta", &[], "ali", &client).await.unwrap();
        router.route("do the thing gamma", &[], "ali", &client).await.unwrap();

        assert_eq!(router.cache_len(), 2);
        // alpha was least recently used and should have been evicted, so
        // asking again costs another model call.
        let calls_before = client.calls.load(std::sync::atomic::Ordering::SeqCst);
        router.route("do the thing alpha", &[], "ali", &client).await.unwrap();
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), calls_before + 1);
    }

    #[tokio::test]
    async fn slash_prefix_switches_to_the_named_agent_without_a_model_call() {
        let router = IntentRouter::new(10);
        let client = stub("unknown");
        let known = vec!["coder".to_string(), "writer".to_string()];

        let decision = router.route("/coder fix the bug", &known, "ali", &client).await.unwrap();
        assert_eq!(decision.target_agent, "coder");
        assert_eq!(decision.intent_type, IntentType::Switch);
        assert_eq!(decision.confidence, 1.0);
        assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let decision = router.route("hey writer, draft this", &known, "ali", &client).await.unwrap();
        assert_eq!(decision.target_agent, "writer");

        let decision = router.route("what time is it?", &known, "ali", &client).await.unwrap();
        assert_eq!(decision.target_agent, "ali");
    }

    #[tokio::test]
    async fn ambiguous_addressee_prefers_the_most_recently_addressed_agent() {
        let router = IntentRouter::new(10);
        let client = stub("unknown");
        let known = vec!["coder".to_string(), "writer".to_string()];

        router.route("/writer start drafting", &known, "ali", &client).await.unwrap();

        let decision = router
            .route("maybe ask coder to look, or ask writer to look, whoever's free", &known, "ali", &client)
            .await
            .unwrap();
        assert_eq!(decision.target_agent, "writer");
    }
}
