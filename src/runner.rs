// Copyright 2026 the Entrant Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Entry runner — wires discovery output to the decision engine.
//!
//! Owns the worker pool. Each target is processed by one worker holding an
//! isolated page session: navigate, snapshot, generate candidates (boosted
//! by SiteMemory), explore with the decision engine, append the trace to
//! memory, and emit events along the way. The session is released exactly
//! once on every exit path.
//!
//! `scraper` types are `!Send`, so the static HTML passes (snapshot shape,
//! candidate generation, frame field scans) run inside `spawn_blocking`.

use crate::browser::{self, BrowserEngine, PageSession, SessionFormDriver};
use crate::candidates;
use crate::classify::{self, visual::VisualScanner};
use crate::config::EntrantConfig;
use crate::engine::{AttemptOutcome, CandidateRunner, DecisionEngine};
use crate::error::AttemptError;
use crate::events::{EntrantEvent, EventBus};
use crate::executor;
use crate::limiter::DomainLimiter;
use crate::memory::SiteMemory;
use crate::model::{
    AttemptRecord, CandidateKind, CompetitionTarget, EntryCandidate, EntryResult, EntryStatus,
    FieldDescriptor, FieldSource, SiteSignature,
};
use crate::profile::PersonalProfile;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;

/// Batch totals returned by [`EntryRunner::run_batch`] alongside the
/// per-target results.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    pub succeeded: usize,
    pub exhausted: usize,
    pub cancelled: usize,
}

/// The orchestrator. Shared read-only across workers.
pub struct EntryRunner {
    cfg: EntrantConfig,
    browser: Arc<dyn BrowserEngine>,
    memory: Arc<SiteMemory>,
    profile: Arc<PersonalProfile>,
    visual: Option<Arc<dyn VisualScanner>>,
    limiter: Arc<DomainLimiter>,
    events: Arc<EventBus>,
}

impl EntryRunner {
    pub fn new(
        cfg: EntrantConfig,
        browser: Arc<dyn BrowserEngine>,
        memory: Arc<SiteMemory>,
        profile: Arc<PersonalProfile>,
    ) -> Self {
        let limiter = Arc::new(DomainLimiter::new(cfg.domain_burst, cfg.domain_refill_ms));
        Self {
            cfg,
            browser,
            memory,
            profile,
            visual: None,
            limiter,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Attach an OCR collaborator for the visual classification fallback.
    pub fn with_visual_scanner(mut self, scanner: Arc<dyn VisualScanner>) -> Self {
        self.visual = Some(scanner);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Process a batch of targets through the worker pool. Results come back
    /// in completion order.
    pub async fn run_batch(
        &self,
        targets: Vec<CompetitionTarget>,
    ) -> (Vec<EntryResult>, BatchStats) {
        let started = std::time::Instant::now();
        let total = targets.len();
        self.events.emit(EntrantEvent::BatchStarted {
            targets: total,
            workers: self.cfg.worker_count,
        });

        let results: Vec<EntryResult> = stream::iter(targets)
            .map(|t| self.run_target(t))
            .buffer_unordered(self.cfg.worker_count.max(1))
            .collect()
            .await;

        let mut stats = BatchStats::default();
        for r in &results {
            match r.status {
                EntryStatus::Success => stats.succeeded += 1,
                EntryStatus::Exhausted => stats.exhausted += 1,
                EntryStatus::Cancelled => stats.cancelled += 1,
            }
        }
        self.events.emit(EntrantEvent::BatchComplete {
            targets: total,
            succeeded: stats.succeeded,
            exhausted: stats.exhausted,
            cancelled: stats.cancelled,
            total_ms: started.elapsed().as_millis() as u64,
        });
        (results, stats)
    }

    /// Process one target end to end. Infallible: every failure mode becomes
    /// a terminal status in the result, and the trace is always recorded.
    pub async fn run_target(&self, target: CompetitionTarget) -> EntryResult {
        let started = std::time::Instant::now();
        self.events.emit(EntrantEvent::TargetStarted {
            target_id: target.id.clone(),
            url: target.url.clone(),
            signature: target.signature.to_string(),
        });

        let (result, attempts) = match self.run_target_inner(&target).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(target_id = %target.id, error = %e, "target aborted before exploration");
                (
                    EntryResult {
                        target_id: target.id.clone(),
                        url: target.url.clone(),
                        signature: target.signature.clone(),
                        status: EntryStatus::Exhausted,
                        winning: None,
                        fill: None,
                        reason: Some(e.to_string()),
                        screenshots: Vec::new(),
                    },
                    Vec::new(),
                )
            }
        };

        for a in &attempts {
            self.events.emit(EntrantEvent::CandidateAttempted {
                target_id: target.id.clone(),
                kind: a.candidate.kind.as_str().to_string(),
                locator: a.candidate.locator.clone(),
                outcome: a.outcome.clone(),
            });
        }

        match self.memory.record(&result, &attempts) {
            Ok(()) => self.events.emit(EntrantEvent::MemoryRecorded {
                signature: result.signature.to_string(),
                status: result.status,
            }),
            Err(e) => tracing::error!(target_id = %target.id, error = %e, "trace not recorded"),
        }

        self.events.emit(EntrantEvent::TargetComplete {
            target_id: target.id.clone(),
            status: result.status,
            fill_rate: result.fill.as_ref().map(|f| f.fill_rate),
            attempts: attempts.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        result
    }

    async fn run_target_inner(
        &self,
        target: &CompetitionTarget,
    ) -> Result<(EntryResult, Vec<AttemptRecord>)> {
        let session = self.browser.new_session().await?;
        let mut live = LiveRunner {
            session,
            cfg: self.cfg.clone(),
            profile: Arc::clone(&self.profile),
            visual: self.visual.clone(),
            limiter: Arc::clone(&self.limiter),
            events: Arc::clone(&self.events),
            target_id: target.id.clone(),
            screenshots: Vec::new(),
        };

        let bootstrap = self.bootstrap(target, &mut live).await;
        let (signature, candidates) = match bootstrap {
            Ok(pair) => pair,
            Err(e) => {
                let _ = live.session.close().await;
                return Err(e);
            }
        };

        let deadline_ms = if target.deadline_ms > 0 {
            target.deadline_ms
        } else {
            self.cfg.target_deadline_ms
        };
        let deadline = Instant::now() + std::time::Duration::from_millis(deadline_ms);

        let traversal = DecisionEngine::new(&self.cfg)
            .explore(target, candidates, &mut live, deadline)
            .await;
        let screenshots = std::mem::take(&mut live.screenshots);
        let _ = live.session.close().await;

        let mut result = traversal.result;
        result.signature = signature;
        result.screenshots = screenshots;
        Ok((result, traversal.attempts))
    }

    /// Navigate to the announcement page and produce the refined signature
    /// plus the initial ranked candidate sequence.
    async fn bootstrap(
        &self,
        target: &CompetitionTarget,
        live: &mut LiveRunner,
    ) -> Result<(SiteSignature, Vec<EntryCandidate>)> {
        self.limiter.acquire(&target.signature.domain).await;
        live.session
            .navigate(&target.url, self.cfg.nav_timeout_ms)
            .await?;

        let snapshot = browser::page_snapshot(&*live.session, self.cfg.max_frame_depth).await?;

        let sig_base = target.signature.clone();
        let cfg = self.cfg.clone();
        let (signature, shape_snapshot) = tokio::task::spawn_blocking(move || {
            let (forms, iframes, links) = snapshot.shape();
            (sig_base.with_shape(forms, iframes, links), snapshot)
        })
        .await?;

        let hint = self.memory.latest_success(&signature)?;
        let boosted = hint.is_some();
        let candidates = tokio::task::spawn_blocking(move || {
            candidates::generate(&shape_snapshot, hint.as_ref(), &cfg)
        })
        .await?;

        self.events.emit(EntrantEvent::CandidatesGenerated {
            target_id: target.id.clone(),
            count: candidates.len(),
            boosted_by_memory: boosted,
        });
        Ok((signature, candidates))
    }
}

// ── Live candidate runner ────────────────────────────────────────────────────

/// Browser-backed [`CandidateRunner`]: one per target, owning the session
/// for the traversal's duration.
struct LiveRunner {
    session: Box<dyn PageSession>,
    cfg: EntrantConfig,
    profile: Arc<PersonalProfile>,
    visual: Option<Arc<dyn VisualScanner>>,
    limiter: Arc<DomainLimiter>,
    events: Arc<EventBus>,
    target_id: String,
    screenshots: Vec<String>,
}

#[async_trait]
impl CandidateRunner for LiveRunner {
    async fn attempt(
        &mut self,
        candidate: &EntryCandidate,
    ) -> Result<AttemptOutcome, AttemptError> {
        match candidate.kind {
            CandidateKind::SpecificLink
            | CandidateKind::GenericLink
            | CandidateKind::ExternalRedirect => self.follow_link(&candidate.locator).await,
            CandidateKind::DomForm => self.fill_dom_form(&candidate.locator).await,
            CandidateKind::IframeForm => self.fill_iframe_form(&candidate.locator).await,
        }
    }
}

impl LiveRunner {
    /// Navigate to a link candidate and enumerate the page it lands on.
    async fn follow_link(&mut self, locator: &str) -> Result<AttemptOutcome, AttemptError> {
        let resolved = self.resolve(locator).await?;
        let domain = SiteSignature::from_url(&resolved).domain;
        self.limiter.acquire(&domain).await;

        let nav = self
            .session
            .navigate(&resolved, self.cfg.nav_timeout_ms)
            .await
            .map_err(|e| map_nav_error(e, &resolved, self.cfg.nav_timeout_ms))?;

        if looks_like_auth_wall(&nav.final_url) {
            return Err(AttemptError::AuthRequired { url: nav.final_url });
        }

        let snapshot = browser::page_snapshot(&*self.session, self.cfg.max_frame_depth).await?;
        let cfg = self.cfg.clone();
        let next = tokio::task::spawn_blocking(move || candidates::generate(&snapshot, None, &cfg))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(AttemptOutcome::Advanced(next))
    }

    /// Classify and fill a form on the current page. Both the scan and the
    /// fill are scoped to the candidate's form selector, so inputs belonging
    /// to other forms on the page never enter the report.
    async fn fill_dom_form(&mut self, locator: &str) -> Result<AttemptOutcome, AttemptError> {
        let present = browser::wait_for_element(&*self.session, locator, self.cfg.element_wait_ms)
            .await?;
        if !present {
            return Err(AttemptError::LocatorNotFound {
                locator: locator.to_string(),
            });
        }

        let raws = browser::scan_live_fields(&*self.session, Some(locator), None).await?;
        let mut descriptors = classify::classify_all(&raws, FieldSource::Dom, &self.cfg);
        let visual_fired = self.apply_visual_fallback(&mut descriptors).await;
        let classified = classify::classifiable_count(&descriptors, &self.cfg);

        self.events.emit(EntrantEvent::FieldsClassified {
            target_id: self.target_id.clone(),
            scanned: descriptors.len(),
            classified,
            visual_fallback: visual_fired,
        });

        if classified < self.cfg.min_classifiable_fields {
            return Err(AttemptError::TooFewFields {
                found: classified,
                need: self.cfg.min_classifiable_fields,
            });
        }

        let mut driver = SessionFormDriver::new(&*self.session).with_scope(locator);
        let report = executor::fill_form(&descriptors, &self.profile, &self.cfg, &mut driver).await;
        Ok(AttemptOutcome::FormFilled(report))
    }

    /// Classify and fill a form inside a frame. Cross-origin platform frames
    /// (empty snapshot HTML) are entered by navigating to the frame URL and
    /// re-enumerating, like a redirect.
    async fn fill_iframe_form(&mut self, locator: &str) -> Result<AttemptOutcome, AttemptError> {
        // Cross-origin platform frames carry a bare frame URL as locator;
        // same-origin form candidates carry `<frame_url>::<form_selector>`.
        let (frame_url, form_sel) = match locator.split_once("::") {
            Some((frame_url, form_sel)) => (frame_url.to_string(), Some(form_sel.to_string())),
            None => (locator.to_string(), None),
        };

        let frames = browser::frame_snapshots(&*self.session, self.cfg.max_frame_depth).await?;
        let Some(frame) = frames.into_iter().find(|f| f.url == frame_url) else {
            return Err(AttemptError::LocatorNotFound {
                locator: locator.to_string(),
            });
        };

        if frame.html.trim().is_empty() {
            return self.follow_link(&frame_url).await;
        }
        if frame.depth > self.cfg.max_frame_depth {
            return Err(AttemptError::FrameDepthExceeded { depth: frame.depth });
        }

        // Live scan inside the frame, scoped to the candidate's form. The
        // geometry comes back in viewport coordinates, so the visual
        // fallback can claim these fields like top-document ones.
        let raws =
            browser::scan_live_fields(&*self.session, form_sel.as_deref(), Some(&frame_url))
                .await?;
        let mut descriptors = classify::classify_all(
            &raws,
            FieldSource::Iframe { depth: frame.depth },
            &self.cfg,
        );
        let visual_fired = self.apply_visual_fallback(&mut descriptors).await;
        let classified = classify::classifiable_count(&descriptors, &self.cfg);

        self.events.emit(EntrantEvent::FieldsClassified {
            target_id: self.target_id.clone(),
            scanned: descriptors.len(),
            classified,
            visual_fallback: visual_fired,
        });

        if classified < self.cfg.min_classifiable_fields {
            return Err(AttemptError::TooFewFields {
                found: classified,
                need: self.cfg.min_classifiable_fields,
            });
        }

        let mut driver = SessionFormDriver::in_frame(&*self.session, &frame_url);
        if let Some(sel) = form_sel.as_deref() {
            driver = driver.with_scope(sel);
        }
        let report = executor::fill_form(&descriptors, &self.profile, &self.cfg, &mut driver).await;
        Ok(AttemptOutcome::FormFilled(report))
    }

    /// Run the visual fallback when the page's combined structural yield
    /// (top document plus frames, not just the current form) classified too
    /// few fields. Returns whether the fallback ran.
    async fn apply_visual_fallback(
        &mut self,
        descriptors: &mut Vec<FieldDescriptor>,
    ) -> bool {
        let Some(scanner) = self.visual.clone() else {
            return false;
        };
        let page_classified = self.page_classified_count().await;
        if !classify::visual::should_invoke(page_classified, &self.cfg) {
            return false;
        }
        if let Err(e) = self.visual_fallback(scanner.as_ref(), descriptors).await {
            tracing::warn!(target_id = %self.target_id, error = %e, "visual fallback failed");
        }
        true
    }

    /// Classifiable fields across the top document and every reachable
    /// frame. This combined count drives the visual-fallback trigger.
    async fn page_classified_count(&self) -> usize {
        let dom = match browser::scan_live_fields(&*self.session, None, None).await {
            Ok(raws) => {
                let descriptors = classify::classify_all(&raws, FieldSource::Dom, &self.cfg);
                classify::classifiable_count(&descriptors, &self.cfg)
            }
            Err(e) => {
                tracing::debug!(target_id = %self.target_id, error = %e, "top document scan failed");
                0
            }
        };
        let frames = browser::frame_snapshots(&*self.session, self.cfg.max_frame_depth)
            .await
            .unwrap_or_default();
        let cfg = self.cfg.clone();
        let framed = tokio::task::spawn_blocking(move || {
            frames
                .iter()
                .filter(|f| f.depth <= cfg.max_frame_depth && !f.html.trim().is_empty())
                .map(|f| {
                    let raws = classify::scan_fields(&f.html, None);
                    let descriptors = classify::classify_all(
                        &raws,
                        FieldSource::Iframe { depth: f.depth },
                        &cfg,
                    );
                    classify::classifiable_count(&descriptors, &cfg)
                })
                .sum::<usize>()
        })
        .await
        .unwrap_or(0);
        dom + framed
    }

    /// Screenshot the page, run OCR, and upgrade unclaimed fields from the
    /// detected text regions.
    async fn visual_fallback(
        &mut self,
        scanner: &dyn VisualScanner,
        descriptors: &mut Vec<FieldDescriptor>,
    ) -> Result<()> {
        let png = self.session.screenshot().await?;
        let shot_path = std::env::temp_dir().join(format!("entrant-{}.png", uuid::Uuid::new_v4()));
        if std::fs::write(&shot_path, &png).is_ok() {
            self.screenshots.push(shot_path.display().to_string());
        }

        let regions = scanner.detect(&png).await?;
        let unclaimed: Vec<_> = descriptors
            .iter()
            .filter(|d| d.kind == crate::model::FieldKind::Unknown)
            .map(|d| d.raw.clone())
            .collect();
        let mapped = classify::visual::map_regions(&regions, &unclaimed, &self.cfg);

        for upgraded in mapped {
            if let Some(slot) = descriptors
                .iter_mut()
                .find(|d| d.raw.locator == upgraded.raw.locator)
            {
                *slot = upgraded;
            }
        }
        Ok(())
    }

    /// Resolve a possibly relative link against the current page URL.
    async fn resolve(&self, locator: &str) -> Result<String, AttemptError> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Ok(locator.to_string());
        }
        let base = self.session.url().await?;
        url::Url::parse(&base)
            .and_then(|b| b.join(locator))
            .map(|u| u.to_string())
            .map_err(|_| AttemptError::LocatorNotFound {
                locator: locator.to_string(),
            })
    }
}

fn map_nav_error(e: anyhow::Error, url: &str, timeout_ms: u64) -> AttemptError {
    if e.to_string().contains("timed out") {
        AttemptError::NavTimeout {
            url: url.to_string(),
            timeout_ms,
        }
    } else {
        AttemptError::Network(e.to_string())
    }
}

fn looks_like_auth_wall(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["/login", "/signin", "/sign-in", "/account/auth"]
        .iter()
        .any(|p| lower.contains(p))
}
