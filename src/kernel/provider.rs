//! Provider-level error taxonomy, retry policy, and model metadata.
//!
//! Sits above the per-vendor [`ClientWrapper`](crate::client_wrapper::ClientWrapper)
//! implementations in `clients/`. Those trait impls translate errors coming back
//! from each vendor's HTTP surface into a [`ProviderError`] here so the rest of
//! the runtime (cost controller, delegation executor, orchestrator) can reason
//! about retryability and cost without knowing which vendor is behind a call.

use std::error::Error;
use std::fmt;

/// Coarse classification of why a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Auth,
    RateLimit,
    Quota,
    ContextLength,
    ContentFilter,
    ModelNotFound,
    Overloaded,
    Timeout,
    Network,
    InvalidRequest,
    NotInitialized,
    Unknown,
}

impl ProviderErrorKind {
    /// Whether a call that failed with this kind is generally worth retrying.
    ///
    /// Auth, quota, context-length, content-filter, model-not-found, and
    /// malformed-request failures won't be fixed by trying again.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimit
                | ProviderErrorKind::Overloaded
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
        )
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::RateLimit => "rate_limit",
            ProviderErrorKind::Quota => "quota",
            ProviderErrorKind::ContextLength => "context_length",
            ProviderErrorKind::ContentFilter => "content_filter",
            ProviderErrorKind::ModelNotFound => "model_not_found",
            ProviderErrorKind::Overloaded => "overloaded",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::InvalidRequest => "invalid_request",
            ProviderErrorKind::NotInitialized => "not_initialized",
            ProviderErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A normalized provider failure, built by each `clients/*.rs` adapter from
/// whatever error shape the vendor's HTTP response actually returned.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Vendor-specific error code, if the response body carried one
    /// (e.g. OpenAI's `"insufficient_quota"`).
    pub provider_code: Option<String>,
    pub http_status: Option<u16>,
    pub retryable: bool,
    /// `Retry-After` header value, when the vendor supplied one.
    pub retry_after_ms: Option<u64>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.default_retryable();
        Self {
            kind,
            message: message.into(),
            provider_code: None,
            http_status: None,
            retryable,
            retry_after_ms: None,
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self.retryable = true;
        self
    }

    /// Classify an HTTP status code into a `ProviderErrorKind` using the
    /// conventions shared by the OpenAI-compatible vendors in `clients/`.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            402 => ProviderErrorKind::Quota,
            404 => ProviderErrorKind::ModelNotFound,
            408 => ProviderErrorKind::Timeout,
            429 => ProviderErrorKind::RateLimit,
            400 | 422 => ProviderErrorKind::InvalidRequest,
            500..=599 => ProviderErrorKind::Overloaded,
            _ => ProviderErrorKind::Unknown,
        };
        Self::new(kind, message).with_http_status(status)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(code) = &self.provider_code {
            write!(f, " (code: {code})")?;
        }
        if let Some(status) = self.http_status {
            write!(f, " [http {status}]")?;
        }
        Ok(())
    }
}

impl Error for ProviderError {}

/// Exponential backoff with deterministic jitter, sized for 3 attempts by default.
///
/// Like the retry helper this is grounded on, jitter here is a deterministic
/// function of the attempt number rather than a sampled random draw — it
/// keeps `compute_delay` pure and unit-testable without pulling in a `rand`
/// dependency the rest of the workspace doesn't otherwise need.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the capped delay the jitter window spans, e.g. `0.2` = ±20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based: the first retry is `attempt == 1`).
    pub fn compute_delay(&self, attempt: u32) -> u64 {
        let attempt = attempt.max(1);
        let shift = (attempt - 1).min(20);
        let exponential = self.base_delay_ms.saturating_mul(1u64 << shift);
        let capped = exponential.min(self.max_delay_ms);

        // Decorrelated jitter factor, cycling deterministically by attempt so
        // repeated retries of the same call don't all land on the same delay.
        let jitter_factor = match attempt % 4 {
            0 => 1.0 - self.jitter,
            1 => 1.0,
            2 => 1.0 - self.jitter * 0.5,
            _ => 1.0 + self.jitter * 0.5,
        };

        ((capped as f64) * jitter_factor).round() as u64
    }

    /// Whether `attempt` (1-based count of retries already made) should be
    /// allowed to fire again, given the error that just occurred.
    pub fn should_retry(&self, attempt: u32, err: &ProviderError) -> bool {
        err.retryable && attempt < self.max_attempts
    }
}

/// Capability and pricing tier a model is marketed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Flagship,
    Balanced,
    Economy,
}

/// Static metadata about a specific model, used for cost estimation and
/// capability checks ahead of dispatching a call.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    pub provider_id: String,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
    pub thinking_cost_per_million: Option<f64>,
    pub context_window: usize,
    pub max_output_tokens: usize,
    pub supports_tools: bool,
    pub supports_vision: bool,
    pub supports_streaming: bool,
    pub tier: ModelTier,
    pub release_date: Option<String>,
    pub deprecated: bool,
}

impl ModelInfo {
    /// Estimate the USD cost of a call given input/output token counts.
    /// Ignores `thinking_cost_per_million` — reasoning-token accounting is
    /// vendor-specific and surfaced separately when a response reports it.
    pub fn estimate_cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        let input = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input + output
    }
}

/// Lookup table of known models, keyed by model id.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: std::collections::HashMap<String, ModelInfo>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with the handful of flagship models each of the
    /// five backends in `clients/` defaults to. Hosts are free to register
    /// additional or updated entries as pricing changes.
    pub fn with_known_models() -> Self {
        let mut registry = Self::new();
        registry.register(ModelInfo {
            id: "gpt-4o".to_string(),
            display_name: "GPT-4o".to_string(),
            provider_id: "openai".to_string(),
            input_cost_per_million: 2.50,
            output_cost_per_million: 10.00,
            thinking_cost_per_million: None,
            context_window: 128_000,
            max_output_tokens: 16_384,
            supports_tools: true,
            supports_vision: true,
            supports_streaming: true,
            tier: ModelTier::Flagship,
            release_date: Some("2024-05-13".to_string()),
            deprecated: false,
        });
        registry.register(ModelInfo {
            id: "claude-3-7-sonnet".to_string(),
            display_name: "Claude 3.7 Sonnet".to_string(),
            provider_id: "anthropic".to_string(),
            input_cost_per_million: 3.00,
            output_cost_per_million: 15.00,
            thinking_cost_per_million: Some(15.00),
            context_window: 200_000,
            max_output_tokens: 64_000,
            supports_tools: true,
            supports_vision: true,
            supports_streaming: true,
            tier: ModelTier::Flagship,
            release_date: Some("2025-02-24".to_string()),
            deprecated: false,
        });
        registry.register(ModelInfo {
            id: "gemini-1.5-pro".to_string(),
            display_name: "Gemini 1.5 Pro".to_string(),
            provider_id: "gemini".to_string(),
            input_cost_per_million: 1.25,
            output_cost_per_million: 5.00,
            thinking_cost_per_million: None,
            context_window: 2_000_000,
            max_output_tokens: 8_192,
            supports_tools: true,
            supports_vision: true,
            supports_streaming: true,
            tier: ModelTier::Flagship,
            release_date: Some("2024-05-14".to_string()),
            deprecated: false,
        });
        registry.register(ModelInfo {
            id: "grok-2".to_string(),
            display_name: "Grok 2".to_string(),
            provider_id: "grok".to_string(),
            input_cost_per_million: 2.00,
            output_cost_per_million: 10.00,
            thinking_cost_per_million: None,
            context_window: 131_072,
            max_output_tokens: 8_192,
            supports_tools: true,
            supports_vision: false,
            supports_streaming: true,
            tier: ModelTier::Balanced,
            release_date: Some("2024-08-13".to_string()),
            deprecated: false,
        });
        registry.register(ModelInfo {
            id: "local-relay".to_string(),
            display_name: "Local Relay".to_string(),
            provider_id: "local-relay".to_string(),
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
            thinking_cost_per_million: None,
            context_window: 8_192,
            max_output_tokens: 4_096,
            supports_tools: false,
            supports_vision: false,
            supports_streaming: true,
            tier: ModelTier::Economy,
            release_date: None,
            deprecated: false,
        });
        registry.register(ModelInfo {
            id: "on-device".to_string(),
            display_name: "On-Device Model".to_string(),
            provider_id: "on-device".to_string(),
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
            thinking_cost_per_million: None,
            context_window: 4_096,
            max_output_tokens: 2_048,
            supports_tools: false,
            supports_vision: false,
            supports_streaming: false,
            tier: ModelTier::Economy,
            release_date: None,
            deprecated: false,
        });
        registry
    }

    pub fn register(&mut self, info: ModelInfo) {
        self.models.insert(info.id.clone(), info);
    }

    pub fn get(&self, id: &str) -> Option<&ModelInfo> {
        self.models.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<ProviderError>> = const { std::cell::RefCell::new(None) };
}

/// Record the most recent provider failure observed on this thread.
///
/// Retained for callback-style call sites that can't thread a `Result` back
/// to the caller directly; new code should prefer propagating `ProviderError`
/// through `?` and only reach for this as a last resort.
pub fn set_last_error(err: ProviderError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

/// Read back the last error recorded on this thread via [`set_last_error`].
pub fn last_error() -> Option<ProviderError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Clear the thread-local last-error slot.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Rough language classification used to pick a bytes-per-token ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageClass {
    Latin,
    Cjk,
    Mixed,
}

/// Classify `text` by scanning for CJK code points. Cheap and approximate —
/// good enough to pick a token-estimation ratio, not for language detection.
pub fn detect_language_class(text: &str) -> LanguageClass {
    let mut cjk_count = 0usize;
    let mut total = 0usize;
    for ch in text.chars() {
        total += 1;
        let cp = ch as u32;
        let is_cjk = (0x4E00..=0x9FFF).contains(&cp)
            || (0x3040..=0x30FF).contains(&cp)
            || (0xAC00..=0xD7A3).contains(&cp);
        if is_cjk {
            cjk_count += 1;
        }
    }
    if total == 0 {
        return LanguageClass::Latin;
    }
    let ratio = cjk_count as f64 / total as f64;
    if ratio > 0.5 {
        LanguageClass::Cjk
    } else if ratio > 0.05 {
        LanguageClass::Mixed
    } else {
        LanguageClass::Latin
    }
}

/// Estimate the token count of `text` using a bytes-per-token heuristic that
/// varies by language class. CJK text tokenizes much denser than Latin text
/// under BPE tokenizers, so a flat 4-bytes-per-token rule (as used for the
/// session-level estimate in [`crate::llm_session`]) undercounts it badly.
pub fn estimate_tokens(text: &str) -> usize {
    let class = detect_language_class(text);
    let bytes_per_token = match class {
        LanguageClass::Latin => 4.0,
        LanguageClass::Cjk => 1.8,
        LanguageClass::Mixed => 2.6,
    };
    ((text.len() as f64) / bytes_per_token).ceil().max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_spec() {
        assert!(ProviderErrorKind::RateLimit.default_retryable());
        assert!(ProviderErrorKind::Overloaded.default_retryable());
        assert!(ProviderErrorKind::Timeout.default_retryable());
        assert!(ProviderErrorKind::Network.default_retryable());
        assert!(!ProviderErrorKind::Auth.default_retryable());
        assert!(!ProviderErrorKind::Quota.default_retryable());
        assert!(!ProviderErrorKind::ContextLength.default_retryable());
        assert!(!ProviderErrorKind::InvalidRequest.default_retryable());
    }

    #[test]
    fn from_http_status_classifies_common_codes() {
        assert_eq!(
            ProviderError::from_http_status(429, "rate limited").kind,
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderError::from_http_status(401, "bad key").kind,
            ProviderErrorKind::Auth
        );
        assert_eq!(
            ProviderError::from_http_status(503, "overloaded").kind,
            ProviderErrorKind::Overloaded
        );
    }

    #[test]
    fn retry_policy_defaults_match_spec() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1_000);
        assert_eq!(policy.max_delay_ms, 60_000);
    }

    #[test]
    fn compute_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        let d1 = policy.compute_delay(1);
        let d2 = policy.compute_delay(2);
        let d3 = policy.compute_delay(3);
        assert!(d1 < d2);
        assert!(d2 < d3);

        let far_future = policy.compute_delay(50);
        assert!(far_future <= policy.max_delay_ms);
    }

    #[test]
    fn compute_delay_is_pure() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.compute_delay(2), policy.compute_delay(2));
    }

    #[test]
    fn should_retry_respects_max_attempts_and_retryability() {
        let policy = RetryPolicy::default();
        let retryable = ProviderError::new(ProviderErrorKind::Timeout, "timed out");
        let permanent = ProviderError::new(ProviderErrorKind::Auth, "bad key");

        assert!(policy.should_retry(1, &retryable));
        assert!(!policy.should_retry(3, &retryable));
        assert!(!policy.should_retry(1, &permanent));
    }

    #[test]
    fn model_registry_estimates_cost() {
        let registry = ModelRegistry::with_known_models();
        let gpt4o = registry.get("gpt-4o").expect("gpt-4o registered");
        let cost = gpt4o.estimate_cost(1_000_000, 1_000_000);
        assert!((cost - 12.50).abs() < 1e-9);
    }

    #[test]
    fn last_error_roundtrips_through_thread_local() {
        clear_last_error();
        assert!(last_error().is_none());
        set_last_error(ProviderError::new(ProviderErrorKind::Timeout, "slow"));
        let err = last_error().expect("error was set");
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
        clear_last_error();
        assert!(last_error().is_none());
    }

    #[test]
    fn estimate_tokens_counts_cjk_denser_than_latin() {
        let latin = "the quick brown fox jumps over the lazy dog";
        let cjk = "敏捷的棕色狐狸跳过了懒狗的背";
        let latin_tokens = estimate_tokens(latin);
        let cjk_tokens = estimate_tokens(cjk);
        let latin_ratio = latin_tokens as f64 / latin.len() as f64;
        let cjk_ratio = cjk_tokens as f64 / cjk.len() as f64;
        assert!(cjk_ratio > latin_ratio);
    }
}
