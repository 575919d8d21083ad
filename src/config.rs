//! Runtime tunables.
//!
//! Every policy constant from the strategy heuristics lives here with a
//! serde default, so deployments can tune them without code changes. The
//! defaults match the values observed to work on the aggregator sites the
//! system was built against.

use serde::Deserialize;
use std::collections::HashMap;

/// All tunables for candidate generation, classification, the decision
/// engine, and the worker pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntrantConfig {
    // ── Candidate generation ────────────────────────────────────────────
    /// Confidence for links with a competition id above the site baseline.
    pub specific_link_confidence: f32,
    /// Confidence for links at/below the baseline id.
    pub generic_link_confidence: f32,
    /// Confidence for keyword-matched entry links with no id signal.
    pub keyword_link_confidence: f32,
    /// Confidence for recognized third-party platform redirects.
    pub external_confidence: f32,
    /// Field count at which a form's confidence saturates.
    pub form_field_cap: usize,
    /// Multiplier applied per frame-nesting level to iframe form confidence.
    pub iframe_depth_penalty: f32,
    /// Fixed confidence boost for the candidate kind SiteMemory remembers
    /// as previously successful on this signature.
    pub memory_boost: f32,
    /// Baseline competition id per domain; ids above it are specific links.
    pub baseline_ids: HashMap<String, u64>,
    /// Baseline used for domains with no configured entry.
    pub default_baseline_id: u64,

    // ── Field classification ────────────────────────────────────────────
    /// Confidence for an exact vocabulary match on name/id.
    pub exact_match_confidence: f32,
    /// Confidence for a label regex match.
    pub label_match_confidence: f32,
    /// Confidence for a placeholder match.
    pub placeholder_match_confidence: f32,
    /// Confidence for a declared input type match (weak signal).
    pub input_type_confidence: f32,
    /// Below this floor a field is excluded from fill (kept for diagnostics).
    pub confidence_floor: f32,
    /// Subtracted from visually-sourced classifications relative to DOM ones.
    pub visual_penalty: f32,
    /// Visual fallback fires when DOM+iframe classified fields (above the
    /// floor) number fewer than this.
    pub visual_trigger_threshold: usize,
    /// Maximum frame nesting depth scanned for fields and forms.
    pub max_frame_depth: u8,

    // ── Decision engine ─────────────────────────────────────────────────
    /// Minimum classifiable fields a candidate's page must yield.
    pub min_classifiable_fields: usize,
    /// Bounded retries for transient failures before a candidate fails.
    pub transient_retries: u32,
    /// Base backoff between transient retries (doubled each retry, jittered).
    pub retry_backoff_ms: u64,

    // ── Browser / timing ────────────────────────────────────────────────
    pub nav_timeout_ms: u64,
    /// Bounded wait for a candidate's target element to appear.
    pub element_wait_ms: u64,
    /// Default per-target deadline.
    pub target_deadline_ms: u64,

    // ── Worker pool / rate limiting ─────────────────────────────────────
    /// Concurrent targets; each worker owns an isolated browser context.
    pub worker_count: usize,
    /// Token bucket capacity per domain.
    pub domain_burst: u32,
    /// Token refill interval per domain (one navigation permitted per tick).
    pub domain_refill_ms: u64,
}

impl Default for EntrantConfig {
    fn default() -> Self {
        Self {
            specific_link_confidence: 0.98,
            generic_link_confidence: 0.85,
            keyword_link_confidence: 0.6,
            external_confidence: 0.6,
            form_field_cap: 8,
            iframe_depth_penalty: 0.9,
            memory_boost: 0.1,
            baseline_ids: HashMap::from([("aussiecomps.com".to_string(), 15_595)]),
            default_baseline_id: 0,

            exact_match_confidence: 0.95,
            label_match_confidence: 0.85,
            placeholder_match_confidence: 0.75,
            input_type_confidence: 0.55,
            confidence_floor: 0.5,
            visual_penalty: 0.25,
            visual_trigger_threshold: 3,
            max_frame_depth: 3,

            min_classifiable_fields: 1,
            transient_retries: 2,
            retry_backoff_ms: 500,

            nav_timeout_ms: 30_000,
            element_wait_ms: 8_000,
            target_deadline_ms: 120_000,

            worker_count: 4,
            domain_burst: 2,
            domain_refill_ms: 3_000,
        }
    }
}

impl EntrantConfig {
    /// Baseline competition id for a domain.
    pub fn baseline_for(&self, domain: &str) -> u64 {
        self.baseline_ids
            .get(domain)
            .copied()
            .unwrap_or(self.default_baseline_id)
    }
}
