//! Candidate generation — enumerate and rank entry strategies for a page.
//!
//! Walks the loaded page (plus nested frame snapshots) and produces an
//! ordered, deduplicated sequence of [`EntryCandidate`]s:
//!
//! - links carrying a per-competition numeric id above the site baseline are
//!   specific links (strongest signal), at/below the baseline generic links
//! - forms on the page score by how many of their fields classify
//! - forms inside frames score the same way, penalized per nesting level
//! - links to recognized third-party entry platforms are redirects, explored
//!   only after everything stronger has failed
//!
//! A SiteMemory hint for the target's signature boosts the remembered
//! candidate kind by a fixed configurable amount before ranking.
//!
//! All entry points are **synchronous** (`scraper` types are `!Send`);
//! callers wrap in `tokio::task::spawn_blocking`.

use crate::classify;
use crate::config::EntrantConfig;
use crate::memory::MemoryHint;
use crate::model::{CandidateKind, EntryCandidate, FieldSource};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Third-party entry platforms worth redirecting to.
const ENTRY_PLATFORMS: &[&str] = &[
    "gleam.io",
    "woobox",
    "rafflecopter",
    "viralsweep",
    "kingsumo",
    "typeform",
];

/// Link text that suggests an entry path when no id signal exists.
const ENTRY_KEYWORDS: &[&str] = &[
    "enter",
    "enter now",
    "enter competition",
    "join",
    "participate",
    "click here",
    "visit site",
];

/// Hosts never worth following as entry links.
const SKIP_HOSTS: &[&str] = &["facebook", "twitter", "instagram", "mailto:", "javascript:"];

/// One frame captured during page snapshotting.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub url: String,
    pub html: String,
    /// Nesting depth, 1 for a frame directly on the page.
    pub depth: u8,
}

/// A loaded page plus its reachable frames.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub frames: Vec<FrameSnapshot>,
}

impl PageSnapshot {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            html: html.to_string(),
            frames: Vec::new(),
        }
    }

    /// Structural counts for refining the site signature.
    pub fn shape(&self) -> (usize, usize, usize) {
        let document = Html::parse_document(&self.html);
        let count = |sel: &str| {
            Selector::parse(sel)
                .map(|s| document.select(&s).count())
                .unwrap_or(0)
        };
        (count("form"), count("iframe"), count("a[href]"))
    }
}

fn competition_id_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"/ps/(\d+)").expect("ps pattern is valid"),
            Regex::new(r"[?&]id=(\d+)").expect("id pattern is valid"),
        ]
    })
}

/// Extract the per-competition numeric identifier from a link, if any.
pub fn competition_id(href: &str) -> Option<u64> {
    for re in competition_id_patterns() {
        if let Some(caps) = re.captures(href) {
            if let Ok(id) = caps[1].parse() {
                return Some(id);
            }
        }
    }
    None
}

/// Generate the ranked candidate sequence for a page.
///
/// Output is deduplicated by `(kind, locator)` keeping the highest
/// confidence, boosted by the memory hint, and sorted by the engine's
/// `(priority, -confidence)` key with ties broken by generation order.
pub fn generate(
    page: &PageSnapshot,
    hint: Option<&MemoryHint>,
    cfg: &EntrantConfig,
) -> Vec<EntryCandidate> {
    let domain = crate::model::SiteSignature::from_url(&page.url).domain;
    let baseline = cfg.baseline_for(&domain);

    let mut candidates = Vec::new();
    collect_links(&page.html, baseline, cfg, &mut candidates);
    collect_dom_forms(&page.html, cfg, &mut candidates);
    for frame in &page.frames {
        collect_iframe_forms(frame, cfg, &mut candidates);
    }

    // Dedup by (kind, locator), keeping the best confidence seen. Indexing
    // by signature keeps the first-seen position so generation order is the
    // final tiebreak.
    let mut by_sig: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<EntryCandidate> = Vec::new();
    for cand in candidates {
        match by_sig.get(&cand.signature()) {
            Some(&i) => {
                if cand.confidence > deduped[i].confidence {
                    deduped[i].confidence = cand.confidence;
                }
            }
            None => {
                by_sig.insert(cand.signature(), deduped.len());
                deduped.push(cand);
            }
        }
    }

    // Historical boost before ranking.
    if let Some(hint) = hint {
        for cand in &mut deduped {
            if cand.kind == hint.kind {
                cand.confidence = (cand.confidence + cfg.memory_boost).min(1.0);
            }
        }
    }

    // Stable sort preserves generation order among equals.
    deduped.sort_by_key(|c| c.order_key());

    tracing::debug!(
        url = %page.url,
        candidates = deduped.len(),
        "candidate generation complete"
    );
    deduped
}

fn collect_links(
    html: &str,
    baseline: u64,
    cfg: &EntrantConfig,
    out: &mut Vec<EntryCandidate>,
) {
    let document = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").expect("link selector is valid");

    for link in document.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };
        let href_lower = href.to_lowercase();
        if SKIP_HOSTS.iter().any(|s| href_lower.contains(s)) {
            continue;
        }
        let text = link.text().collect::<String>().trim().to_lowercase();

        // Strongest signal: per-competition numeric id.
        if let Some(id) = competition_id(href) {
            if id > baseline {
                out.push(EntryCandidate {
                    kind: CandidateKind::SpecificLink,
                    locator: href.to_string(),
                    confidence: cfg.specific_link_confidence,
                    priority: 1,
                });
            } else {
                out.push(EntryCandidate {
                    kind: CandidateKind::GenericLink,
                    locator: href.to_string(),
                    confidence: cfg.generic_link_confidence,
                    priority: 2,
                });
            }
            continue;
        }

        // Third-party platforms.
        if let Some(platform) = ENTRY_PLATFORMS.iter().find(|p| href_lower.contains(*p)) {
            tracing::trace!(platform, href, "external platform link");
            out.push(EntryCandidate {
                kind: CandidateKind::ExternalRedirect,
                locator: href.to_string(),
                confidence: cfg.external_confidence,
                priority: 3,
            });
            continue;
        }

        // Entry-keyword links with no id signal: weak generic candidates.
        if !text.is_empty() && ENTRY_KEYWORDS.iter().any(|k| text.contains(k)) {
            out.push(EntryCandidate {
                kind: CandidateKind::GenericLink,
                locator: href.to_string(),
                confidence: cfg.keyword_link_confidence,
                priority: 2,
            });
        }
    }
}

fn collect_dom_forms(html: &str, cfg: &EntrantConfig, out: &mut Vec<EntryCandidate>) {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form").expect("form selector is valid");

    for (i, form) in document.select(&form_sel).enumerate() {
        let form_html = form.html();
        let Some(confidence) = form_confidence(&form_html, cfg) else { continue };
        out.push(EntryCandidate {
            kind: CandidateKind::DomForm,
            locator: format!("form:nth-of-type({})", i + 1),
            confidence,
            priority: 2,
        });
    }
}

fn collect_iframe_forms(frame: &FrameSnapshot, cfg: &EntrantConfig, out: &mut Vec<EntryCandidate>) {
    if frame.depth > cfg.max_frame_depth {
        return;
    }
    let document = Html::parse_document(&frame.html);
    let form_sel = Selector::parse("form").expect("form selector is valid");
    let penalty = cfg.iframe_depth_penalty.powi(frame.depth as i32);

    for (i, form) in document.select(&form_sel).enumerate() {
        let form_html = form.html();
        let Some(confidence) = form_confidence(&form_html, cfg) else { continue };
        out.push(EntryCandidate {
            kind: CandidateKind::IframeForm,
            locator: format!("{}::form:nth-of-type({})", frame.url, i + 1),
            confidence: confidence * penalty,
            priority: 2,
        });
    }

    // Frames whose src points at a known platform but whose content was not
    // reachable (cross-origin) still yield a candidate from the src alone.
    if frame.html.is_empty() {
        let src_lower = frame.url.to_lowercase();
        if ENTRY_PLATFORMS.iter().any(|p| src_lower.contains(p)) {
            out.push(EntryCandidate {
                kind: CandidateKind::IframeForm,
                locator: frame.url.clone(),
                confidence: cfg.external_confidence * penalty,
                priority: 2,
            });
        }
    }
}

/// Confidence proportional to the count of classifiable fields, saturating
/// at `form_field_cap`. Forms with no fields yield no candidate.
fn form_confidence(form_html: &str, cfg: &EntrantConfig) -> Option<f32> {
    let raws = classify::scan_fields(form_html, None);
    if raws.is_empty() {
        return None;
    }
    let classified = classify::classify_all(&raws, FieldSource::Dom, cfg);
    let count = classify::classifiable_count(&classified, cfg);
    if count == 0 {
        return None;
    }
    Some((count.min(cfg.form_field_cap) as f32) / cfg.form_field_cap as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EntrantConfig {
        EntrantConfig::default()
    }

    #[test]
    fn test_competition_id_patterns() {
        assert_eq!(competition_id("https://www.aussiecomps.com/ps/15630"), Some(15630));
        assert_eq!(competition_id("/index.php?id=24734&cat_id=0"), Some(24734));
        assert_eq!(competition_id("/about"), None);
    }

    #[test]
    fn test_specific_beats_generic_at_baseline() {
        // The page exposes the baseline link 15595 and the per-competition
        // link 15630; the latter must rank first.
        let html = r#"
            <a href="https://www.aussiecomps.com/ps/15630">To enter this promotion</a>
            <a href="https://www.aussiecomps.com/ps/15595">Visit site</a>
        "#;
        let page = PageSnapshot::new("https://www.aussiecomps.com/index.php?id=24763", html);
        let cands = generate(&page, None, &cfg());
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].kind, CandidateKind::SpecificLink);
        assert!(cands[0].locator.contains("15630"));
        assert!((cands[0].confidence - 0.98).abs() < 1e-6);
        assert_eq!(cands[0].priority, 1);
        assert_eq!(cands[1].kind, CandidateKind::GenericLink);
        assert!((cands[1].confidence - 0.85).abs() < 1e-6);
        assert_eq!(cands[1].priority, 2);
    }

    #[test]
    fn test_dom_form_confidence_tracks_field_count() {
        let rich = r#"<form>
            <input name="first_name"><input name="last_name">
            <input name="email"><input name="phone">
        </form>"#;
        let sparse = r#"<form><input name="email"></form>"#;
        let rich_cands = generate(&PageSnapshot::new("https://a.com", rich), None, &cfg());
        let sparse_cands = generate(&PageSnapshot::new("https://a.com", sparse), None, &cfg());
        assert_eq!(rich_cands[0].kind, CandidateKind::DomForm);
        assert!(rich_cands[0].confidence > sparse_cands[0].confidence);
    }

    #[test]
    fn test_iframe_form_penalized_by_depth() {
        let form = r#"<form><input name="email"><input name="first_name"></form>"#;
        let mut shallow = PageSnapshot::new("https://a.com", "");
        shallow.frames.push(FrameSnapshot {
            url: "https://a.com/f1".into(),
            html: form.into(),
            depth: 1,
        });
        let mut deep = PageSnapshot::new("https://a.com", "");
        deep.frames.push(FrameSnapshot {
            url: "https://a.com/f2".into(),
            html: form.into(),
            depth: 3,
        });
        let s = generate(&shallow, None, &cfg());
        let d = generate(&deep, None, &cfg());
        assert_eq!(s[0].kind, CandidateKind::IframeForm);
        assert!(s[0].confidence > d[0].confidence);
    }

    #[test]
    fn test_frames_beyond_depth_bound_ignored() {
        let form = r#"<form><input name="email"></form>"#;
        let mut page = PageSnapshot::new("https://a.com", "");
        page.frames.push(FrameSnapshot {
            url: "https://a.com/deep".into(),
            html: form.into(),
            depth: 4,
        });
        assert!(generate(&page, None, &cfg()).is_empty());
    }

    #[test]
    fn test_external_platform_low_priority() {
        let html = r#"
            <form><input name="email"></form>
            <a href="https://gleam.io/abc/win">Enter on Gleam</a>
        "#;
        let cands = generate(&PageSnapshot::new("https://a.com", html), None, &cfg());
        let ext = cands
            .iter()
            .find(|c| c.kind == CandidateKind::ExternalRedirect)
            .unwrap();
        assert_eq!(ext.priority, 3);
        assert!((ext.confidence - 0.6).abs() < 1e-6);
        // The redirect sorts after the on-page form.
        assert_eq!(cands.last().unwrap().kind, CandidateKind::ExternalRedirect);
    }

    #[test]
    fn test_social_links_skipped() {
        let html = r#"
            <a href="https://facebook.com/share">Enter now</a>
            <a href="mailto:win@a.com">Enter by email</a>
        "#;
        assert!(generate(&PageSnapshot::new("https://a.com", html), None, &cfg()).is_empty());
    }

    #[test]
    fn test_dedup_keeps_highest_confidence() {
        let html = r#"
            <a href="/ps/15700">Enter</a>
            <a href="/ps/15700">Enter here too</a>
        "#;
        let cands = generate(
            &PageSnapshot::new("https://www.aussiecomps.com/x", html),
            None,
            &cfg(),
        );
        assert_eq!(cands.len(), 1);
    }

    #[test]
    fn test_memory_boost_raises_rank() {
        // A generic link outranks the on-page form until memory remembers
        // the DomForm strategy succeeding on this signature.
        let html = r#"
            <a href="/ps/15500">Visit site</a>
            <form>
              <input name="email"><input name="first_name"><input name="last_name">
              <input name="phone"><input name="postcode"><input name="address">
            </form>
        "#;
        let page = PageSnapshot::new("https://www.aussiecomps.com/x", html);
        let mut c = cfg();
        c.memory_boost = 0.2;

        let unboosted = generate(&page, None, &c);
        let hint = MemoryHint {
            kind: CandidateKind::DomForm,
            locator: "form:nth-of-type(1)".into(),
        };
        let boosted = generate(&page, Some(&hint), &c);

        let rank = |cands: &[EntryCandidate]| {
            cands
                .iter()
                .position(|x| x.kind == CandidateKind::DomForm)
                .unwrap()
        };
        assert!(rank(&boosted) < rank(&unboosted));
    }

    #[test]
    fn test_cross_origin_platform_frame_still_candidate() {
        let mut page = PageSnapshot::new("https://a.com", "");
        page.frames.push(FrameSnapshot {
            url: "https://viralsweep.com/widget/123".into(),
            html: String::new(),
            depth: 1,
        });
        let cands = generate(&page, None, &cfg());
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].kind, CandidateKind::IframeForm);
    }

    #[test]
    fn test_shape_counts() {
        let html = r#"<form></form><iframe src="x"></iframe><a href="/a">a</a><a href="/b">b</a>"#;
        let page = PageSnapshot::new("https://a.com", html);
        assert_eq!(page.shape(), (1, 1, 2));
    }
}
