// Copyright 2026 Entrant Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data model — targets, candidates, fields, results.
//!
//! Everything here is transient per target except [`SiteSignature`], which
//! keys the durable SiteMemory log.

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// A competition to be entered. Produced by the discovery collaborator and
/// immutable from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionTarget {
    /// Unique id for this unit of work.
    pub id: String,
    /// Page where the competition is announced.
    pub url: String,
    /// Competition title as discovered.
    pub title: String,
    /// Stable fingerprint keying historical learning.
    pub signature: SiteSignature,
    /// Per-target deadline in milliseconds; on expiry the traversal is
    /// cancelled and remaining candidates are not attempted.
    pub deadline_ms: u64,
}

impl CompetitionTarget {
    /// Build a target with a fresh id and a fingerprint derived from the URL
    /// alone (the structural part is refined once the page is loaded).
    pub fn new(url: &str, title: &str, deadline_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: title.to_string(),
            signature: SiteSignature::from_url(url),
            deadline_ms,
        }
    }
}

/// Domain plus structural fingerprint. Two competition pages on the same
/// aggregator share a signature, which is what makes historical boosts useful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteSignature {
    /// Registrable host of the target URL (no scheme, no port).
    pub domain: String,
    /// FNV hash of the page's structural shape.
    pub fingerprint: u64,
}

impl SiteSignature {
    /// Signature from URL only; fingerprint 0 until the page shape is known.
    pub fn from_url(url: &str) -> Self {
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| url.to_string());
        Self {
            domain,
            fingerprint: 0,
        }
    }

    /// Refine the fingerprint from structural counts of the loaded page.
    /// Counts are bucketized so minor content churn keeps the signature stable.
    pub fn with_shape(mut self, forms: usize, iframes: usize, links: usize) -> Self {
        let mut hasher = FnvHasher::default();
        self.domain.hash(&mut hasher);
        bucket(forms).hash(&mut hasher);
        bucket(iframes).hash(&mut hasher);
        bucket(links).hash(&mut hasher);
        self.fingerprint = hasher.finish();
        self
    }
}

impl fmt::Display for SiteSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:016x}", self.domain, self.fingerprint)
    }
}

/// Bucketize a count: 0, 1, 2, "a few", "many". Keeps fingerprints stable
/// across small edits to the page.
fn bucket(n: usize) -> u8 {
    match n {
        0 => 0,
        1 => 1,
        2 => 2,
        3..=9 => 3,
        10..=49 => 4,
        _ => 5,
    }
}

/// One concrete strategy for reaching/filling an entry form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Link with a per-competition numeric id above the site baseline.
    SpecificLink,
    /// Link at/below the baseline id, or a keyword-matched entry link.
    GenericLink,
    /// Form found directly on the page.
    DomForm,
    /// Form found inside a (possibly nested) frame.
    IframeForm,
    /// Link out to a recognized third-party entry platform.
    ExternalRedirect,
}

impl CandidateKind {
    /// Number of kinds; bounds the depth of the backtracking search, since
    /// each level of the tree consumes one strategy kind.
    pub const COUNT: usize = 5;

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::SpecificLink => "specific_link",
            CandidateKind::GenericLink => "generic_link",
            CandidateKind::DomForm => "dom_form",
            CandidateKind::IframeForm => "iframe_form",
            CandidateKind::ExternalRedirect => "external_redirect",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "specific_link" => Some(CandidateKind::SpecificLink),
            "generic_link" => Some(CandidateKind::GenericLink),
            "dom_form" => Some(CandidateKind::DomForm),
            "iframe_form" => Some(CandidateKind::IframeForm),
            "external_redirect" => Some(CandidateKind::ExternalRedirect),
            _ => None,
        }
    }
}

/// A ranked entry strategy. `priority` is the primary sort key (lower tried
/// first); `confidence` breaks ties within a priority band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryCandidate {
    pub kind: CandidateKind,
    /// CSS selector, URL, or frame locator, depending on kind.
    pub locator: String,
    /// In `[0.0, 1.0]`. Assigned before the candidate enters the engine.
    pub confidence: f32,
    /// Small integer, lower = tried first.
    pub priority: u8,
}

impl EntryCandidate {
    /// Dedup/visited-set key: a candidate is the same strategy if kind and
    /// locator match, regardless of confidence.
    pub fn signature(&self) -> String {
        format!("{}|{}", self.kind.as_str(), self.locator)
    }

    /// Ordering key: lexicographically smallest `(priority, -confidence)`
    /// is attempted first. Confidence is quantized so float noise cannot
    /// reorder equal candidates.
    pub fn order_key(&self) -> (u8, i64) {
        (self.priority, -((self.confidence * 10_000.0) as i64))
    }
}

/// Semantic category of a form field. Exhaustive by design: classification is
/// total, and anything unrecognized lands in `Unknown` with confidence 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    FirstName,
    LastName,
    Email,
    Phone,
    AddressLine,
    City,
    State,
    PostalCode,
    Country,
    TermsCheckbox,
    Unknown,
}

impl FieldKind {
    /// Canonical fill order: name, contact, address, consent, remainder.
    /// Fixed so fill order is reproducible across runs.
    pub const FILL_ORDER: [FieldKind; 11] = [
        FieldKind::FirstName,
        FieldKind::LastName,
        FieldKind::Email,
        FieldKind::Phone,
        FieldKind::AddressLine,
        FieldKind::City,
        FieldKind::State,
        FieldKind::PostalCode,
        FieldKind::Country,
        FieldKind::TermsCheckbox,
        FieldKind::Unknown,
    ];
}

/// Where a field descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Dom,
    Iframe { depth: u8 },
    Visual,
}

/// Raw attributes of one input element, before classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    pub id: String,
    pub label: String,
    pub placeholder: String,
    /// Declared `type` attribute (`text`, `email`, `tel`, `checkbox`, ...).
    pub input_type: String,
    /// Selector that reaches this element for filling.
    pub locator: String,
    /// Viewport bounding box `(x, y, w, h)`, when the scan had geometry.
    /// Needed to claim OCR text regions by proximity.
    pub bbox: Option<(f32, f32, f32, f32)>,
}

/// A classified field: raw attributes plus semantic kind and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    pub source: FieldSource,
    pub raw: RawField,
    /// Classification confidence in `[0.0, 1.0]`. Below the configured floor
    /// the field is excluded from fill but kept for diagnostics.
    pub confidence: f32,
}

impl FieldDescriptor {
    pub fn is_checkbox(&self) -> bool {
        self.raw.input_type.eq_ignore_ascii_case("checkbox")
    }
}

/// Per-field fill outcome. A single field failure never aborts the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    Filled,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

/// Why a field was skipped rather than filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No profile value for this semantic kind.
    NoProfileValue,
    /// Classification confidence below the configured floor.
    BelowConfidenceFloor,
    /// Classifier could not assign a semantic kind.
    Unclassified,
}

/// Terminal status of one target's traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// A candidate reached a form and filling completed.
    Success,
    /// Every candidate in the tree failed.
    Exhausted,
    /// The target deadline elapsed mid-traversal.
    Cancelled,
}

/// Report for one filled (or attempted) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillReport {
    /// `(descriptor, outcome)` in canonical fill order.
    pub fields: Vec<(FieldDescriptor, FieldOutcome)>,
    /// filled / total scanned descriptors.
    pub fill_rate: f32,
}

impl FillReport {
    pub fn filled_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|(_, o)| matches!(o, FieldOutcome::Filled))
            .count()
    }
}

/// Final result for one target, handed to the tracking collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResult {
    pub target_id: String,
    pub url: String,
    pub signature: SiteSignature,
    pub status: EntryStatus,
    /// The candidate that succeeded, when status is `Success`.
    pub winning: Option<EntryCandidate>,
    /// Fill report for the winning form, when any form was reached.
    pub fill: Option<FillReport>,
    /// Why the traversal ended, for Exhausted/Cancelled.
    pub reason: Option<String>,
    /// Opaque screenshot references captured along the way.
    pub screenshots: Vec<String>,
}

/// One attempted candidate in the traversal trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub candidate: EntryCandidate,
    /// `"success"`, `"advanced"`, `"failed"`, or `"skipped"`.
    pub outcome: String,
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_from_url_strips_www() {
        let sig = SiteSignature::from_url("https://www.aussiecomps.com/index.php?id=24734");
        assert_eq!(sig.domain, "aussiecomps.com");
        assert_eq!(sig.fingerprint, 0);
    }

    #[test]
    fn test_signature_shape_is_stable_within_bucket() {
        let base = SiteSignature::from_url("https://example.com/");
        let a = base.clone().with_shape(1, 0, 12);
        let b = base.clone().with_shape(1, 0, 30);
        let c = base.with_shape(2, 0, 12);
        // 12 and 30 links fall in the same bucket; 1 vs 2 forms do not.
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_candidate_order_key() {
        let specific = EntryCandidate {
            kind: CandidateKind::SpecificLink,
            locator: "/ps/15630".into(),
            confidence: 0.98,
            priority: 1,
        };
        let generic = EntryCandidate {
            kind: CandidateKind::GenericLink,
            locator: "/ps/15595".into(),
            confidence: 0.85,
            priority: 2,
        };
        assert!(specific.order_key() < generic.order_key());
    }

    #[test]
    fn test_candidate_signature_ignores_confidence() {
        let mut a = EntryCandidate {
            kind: CandidateKind::DomForm,
            locator: "form:nth-of-type(1)".into(),
            confidence: 0.5,
            priority: 2,
        };
        let sig = a.signature();
        a.confidence = 0.9;
        assert_eq!(a.signature(), sig);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            CandidateKind::SpecificLink,
            CandidateKind::GenericLink,
            CandidateKind::DomForm,
            CandidateKind::IframeForm,
            CandidateKind::ExternalRedirect,
        ] {
            assert_eq!(CandidateKind::from_str_opt(kind.as_str()), Some(kind));
        }
        assert_eq!(CandidateKind::from_str_opt("bogus"), None);
    }

    #[test]
    fn test_fill_order_starts_with_names_ends_with_unknown() {
        assert_eq!(FieldKind::FILL_ORDER[0], FieldKind::FirstName);
        assert_eq!(FieldKind::FILL_ORDER[1], FieldKind::LastName);
        assert_eq!(*FieldKind::FILL_ORDER.last().unwrap(), FieldKind::Unknown);
    }
}
