//! Decision tree engine — depth-bounded backtracking over entry strategies.
//!
//! Per target the engine runs a small state machine
//! (`Pending → Exploring → Success | Exhausted | Cancelled`). The root's
//! children are seeded from the candidate generator; at every choice point
//! the engine attempts the untried child with the smallest
//! `(priority, -confidence)` key, observes the outcome through the
//! [`CandidateRunner`] seam, and backtracks on failure. The first viable
//! strategy wins — the engine never searches for a globally optimal one.
//!
//! A visited set of candidate signatures spans the whole traversal, so a
//! locator that failed in one branch is never re-attempted from another
//! (this also guards against cyclic frame references). Depth is bounded by
//! the number of candidate kinds, since each level consumes one strategy.

pub mod arena;

use crate::config::EntrantConfig;
use crate::error::{AttemptError, ErrorClass};
use crate::model::{
    AttemptRecord, CandidateKind, CompetitionTarget, EntryCandidate, EntryResult, EntryStatus,
    FillReport,
};
use arena::{DecisionArena, NodeId, NodeOutcome};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// What a successful candidate attempt produced.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The candidate reached a form and filling completed. Terminal.
    FormFilled(FillReport),
    /// The candidate navigated to a new page that itself needs a strategy;
    /// these candidates seed the node's children lazily.
    Advanced(Vec<EntryCandidate>),
}

/// Seam between the engine and the browser-backed executor. Test
/// implementations script outcomes; the production implementation navigates,
/// clicks, binds to frames, and fills forms.
#[async_trait]
pub trait CandidateRunner: Send {
    async fn attempt(&mut self, candidate: &EntryCandidate)
        -> Result<AttemptOutcome, AttemptError>;
}

/// Completed traversal: the terminal result plus the full attempt trace
/// consumed by the outcome recorder.
#[derive(Debug)]
pub struct Traversal {
    pub result: EntryResult,
    pub attempts: Vec<AttemptRecord>,
}

/// The engine itself. Owns nothing durable; one `explore` call per target.
pub struct DecisionEngine<'a> {
    cfg: &'a EntrantConfig,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(cfg: &'a EntrantConfig) -> Self {
        Self { cfg }
    }

    /// Explore the target's strategy tree until Success, exhaustion, or the
    /// deadline. Never returns an error: every failure mode terminates in a
    /// recorded terminal status.
    pub async fn explore(
        &self,
        target: &CompetitionTarget,
        initial: Vec<EntryCandidate>,
        runner: &mut dyn CandidateRunner,
        deadline: Instant,
    ) -> Traversal {
        let mut arena = DecisionArena::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        arena.seed_children(DecisionArena::ROOT, initial);
        tracing::debug!(target_id = %target.id, url = %target.url, "exploring");

        let mut current: NodeId = DecisionArena::ROOT;

        loop {
            if Instant::now() >= deadline {
                self.skip_pending(&arena, current, &mut attempts);
                return self.finish(
                    target,
                    EntryStatus::Cancelled,
                    None,
                    None,
                    Some("target deadline exceeded".into()),
                    attempts,
                );
            }

            let Some(child) = arena.next_untried_child(current) else {
                // Current node is exhausted.
                if current == DecisionArena::ROOT {
                    return self.finish(
                        target,
                        EntryStatus::Exhausted,
                        None,
                        None,
                        Some("all candidates failed".into()),
                        attempts,
                    );
                }
                arena.set_outcome(current, NodeOutcome::Failed);
                current = arena
                    .node(current)
                    .parent
                    .expect("non-root node has a parent");
                continue;
            };

            let candidate = arena
                .node(child)
                .candidate
                .clone()
                .expect("non-root node carries a candidate");

            // Visited-set: the same strategy signature is never attempted
            // twice within one traversal, even from a different branch.
            if !visited.insert(candidate.signature()) {
                arena.set_outcome(child, NodeOutcome::Failed);
                attempts.push(record(&candidate, "skipped", Some("duplicate candidate signature")));
                continue;
            }

            let started_at = Utc::now();
            let outcome = self.attempt_with_retry(runner, &candidate, deadline).await;
            let finished_at = Utc::now();

            match outcome {
                Ok(AttemptOutcome::FormFilled(report)) => {
                    arena.set_outcome(child, NodeOutcome::Success);
                    let mut up = Some(child);
                    while let Some(id) = up {
                        arena.set_outcome(id, NodeOutcome::Success);
                        up = arena.node(id).parent;
                    }
                    attempts.push(AttemptRecord {
                        candidate: candidate.clone(),
                        outcome: "success".into(),
                        error: None,
                        started_at,
                        finished_at,
                    });
                    tracing::info!(
                        target_id = %target.id,
                        kind = candidate.kind.as_str(),
                        fill_rate = report.fill_rate,
                        "entry strategy succeeded"
                    );
                    return self.finish(
                        target,
                        EntryStatus::Success,
                        Some(candidate),
                        Some(report),
                        None,
                        attempts,
                    );
                }
                Ok(AttemptOutcome::Advanced(next)) => {
                    if arena.depth(child) >= CandidateKind::COUNT {
                        arena.set_outcome(child, NodeOutcome::Failed);
                        attempts.push(AttemptRecord {
                            candidate,
                            outcome: "failed".into(),
                            error: Some("search depth bound reached".into()),
                            started_at,
                            finished_at,
                        });
                        continue;
                    }
                    if next.is_empty() {
                        arena.set_outcome(child, NodeOutcome::Failed);
                        attempts.push(AttemptRecord {
                            candidate,
                            outcome: "failed".into(),
                            error: Some("advanced page yielded no candidates".into()),
                            started_at,
                            finished_at,
                        });
                        continue;
                    }
                    attempts.push(AttemptRecord {
                        candidate,
                        outcome: "advanced".into(),
                        error: None,
                        started_at,
                        finished_at,
                    });
                    arena.seed_children(child, next);
                    current = child;
                }
                Err(err) => {
                    arena.set_outcome(child, NodeOutcome::Failed);
                    let fatal = err.is_fatal();
                    let is_deadline = matches!(err, AttemptError::DeadlineExceeded);
                    attempts.push(AttemptRecord {
                        candidate: candidate.clone(),
                        outcome: "failed".into(),
                        error: Some(err.to_string()),
                        started_at,
                        finished_at,
                    });
                    tracing::debug!(
                        target_id = %target.id,
                        kind = candidate.kind.as_str(),
                        error = %err,
                        fatal,
                        "candidate failed"
                    );
                    if fatal {
                        self.skip_pending(&arena, current, &mut attempts);
                        let status = if is_deadline {
                            EntryStatus::Cancelled
                        } else {
                            EntryStatus::Exhausted
                        };
                        return self.finish(target, status, None, None, Some(err.to_string()), attempts);
                    }
                    // Structural/exhausted-transient: backtrack to the next
                    // sibling on the following iteration.
                }
            }
        }
    }

    /// One candidate attempt with bounded, jittered retries on transient
    /// failures. The whole thing races the target deadline.
    async fn attempt_with_retry(
        &self,
        runner: &mut dyn CandidateRunner,
        candidate: &EntryCandidate,
        deadline: Instant,
    ) -> Result<AttemptOutcome, AttemptError> {
        let mut retries = 0u32;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AttemptError::DeadlineExceeded);
            }

            match tokio::time::timeout_at(deadline, runner.attempt(candidate)).await {
                Err(_) => return Err(AttemptError::DeadlineExceeded),
                Ok(Ok(outcome)) => return Ok(outcome),
                Ok(Err(err)) => {
                    if err.class() == ErrorClass::Transient && retries < self.cfg.transient_retries {
                        retries += 1;
                        let base = self.cfg.retry_backoff_ms * 2u64.pow(retries - 1);
                        let jitter = rand::thread_rng().gen_range(0..=base.max(4) / 4);
                        let delay = Duration::from_millis(base + jitter).min(remaining);
                        tracing::trace!(
                            locator = %candidate.locator,
                            retry = retries,
                            delay_ms = delay.as_millis() as u64,
                            "transient failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Record remaining untried candidates as skipped when the traversal is
    /// aborted. Walks from the abort point up to the root so untried
    /// siblings at every ancestor level land in the trace too.
    fn skip_pending(&self, arena: &DecisionArena, current: NodeId, attempts: &mut Vec<AttemptRecord>) {
        let mut node = Some(current);
        while let Some(id) = node {
            for child in arena.pending_children(id) {
                if let Some(cand) = arena.node(child).candidate.as_ref() {
                    attempts.push(record(cand, "skipped", Some("traversal aborted")));
                }
            }
            node = arena.node(id).parent;
        }
    }

    fn finish(
        &self,
        target: &CompetitionTarget,
        status: EntryStatus,
        winning: Option<EntryCandidate>,
        fill: Option<FillReport>,
        reason: Option<String>,
        attempts: Vec<AttemptRecord>,
    ) -> Traversal {
        tracing::info!(target_id = %target.id, ?status, attempts = attempts.len(), "traversal done");
        Traversal {
            result: EntryResult {
                target_id: target.id.clone(),
                url: target.url.clone(),
                signature: target.signature.clone(),
                status,
                winning,
                fill,
                reason,
                screenshots: Vec::new(),
            },
            attempts,
        }
    }
}

fn record(candidate: &EntryCandidate, outcome: &str, error: Option<&str>) -> AttemptRecord {
    let now = Utc::now();
    AttemptRecord {
        candidate: candidate.clone(),
        outcome: outcome.into(),
        error: error.map(String::from),
        started_at: now,
        finished_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SiteSignature;
    use std::collections::HashMap;

    fn cand(kind: CandidateKind, locator: &str, confidence: f32, priority: u8) -> EntryCandidate {
        EntryCandidate {
            kind,
            locator: locator.into(),
            confidence,
            priority,
        }
    }

    fn target() -> CompetitionTarget {
        CompetitionTarget {
            id: "t1".into(),
            url: "https://www.aussiecomps.com/index.php?id=24763".into(),
            title: "Win a thing".into(),
            signature: SiteSignature::from_url("https://www.aussiecomps.com/"),
            deadline_ms: 120_000,
        }
    }

    fn empty_fill() -> FillReport {
        FillReport {
            fields: Vec::new(),
            fill_rate: 1.0,
        }
    }

    /// Scripted runner: maps locator → sequence of outcomes, records the
    /// order in which candidates were attempted.
    struct ScriptedRunner {
        script: HashMap<String, Vec<Result<AttemptOutcome, AttemptError>>>,
        pub attempted: Vec<String>,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                script: HashMap::new(),
                attempted: Vec::new(),
            }
        }

        fn on(mut self, locator: &str, outcome: Result<AttemptOutcome, AttemptError>) -> Self {
            self.script.entry(locator.into()).or_default().push(outcome);
            self
        }
    }

    #[async_trait]
    impl CandidateRunner for ScriptedRunner {
        async fn attempt(
            &mut self,
            candidate: &EntryCandidate,
        ) -> Result<AttemptOutcome, AttemptError> {
            self.attempted.push(candidate.locator.clone());
            match self.script.get_mut(&candidate.locator) {
                Some(outcomes) if !outcomes.is_empty() => outcomes.remove(0),
                _ => Err(AttemptError::LocatorNotFound {
                    locator: candidate.locator.clone(),
                }),
            }
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    fn cfg() -> EntrantConfig {
        EntrantConfig {
            retry_backoff_ms: 1,
            ..EntrantConfig::default()
        }
    }

    #[tokio::test]
    async fn test_selects_smallest_priority_then_highest_confidence() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new()
            .on("/ps/15630", Ok(AttemptOutcome::FormFilled(empty_fill())));
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::GenericLink, "/ps/15595", 0.85, 2),
                    cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        // 15630 attempted first and the engine halted on first success.
        assert_eq!(runner.attempted, vec!["/ps/15630"]);
        assert_eq!(traversal.result.status, EntryStatus::Success);
        assert_eq!(traversal.result.winning.unwrap().locator, "/ps/15630");
    }

    #[tokio::test]
    async fn test_backtracks_to_next_sibling_on_structural_failure() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new()
            .on(
                "/ps/15630",
                Err(AttemptError::LocatorNotFound {
                    locator: "/ps/15630".into(),
                }),
            )
            .on("/ps/15595", Ok(AttemptOutcome::FormFilled(empty_fill())));
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1),
                    cand(CandidateKind::GenericLink, "/ps/15595", 0.85, 2),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(runner.attempted, vec!["/ps/15630", "/ps/15595"]);
        assert_eq!(traversal.result.status, EntryStatus::Success);
        // Both attempts are in the trace, failure first.
        assert_eq!(traversal.attempts.len(), 2);
        assert_eq!(traversal.attempts[0].outcome, "failed");
        assert_eq!(traversal.attempts[1].outcome, "success");
    }

    #[tokio::test]
    async fn test_exhausted_when_all_fail() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new();
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::DomForm, "form:nth-of-type(1)", 0.5, 2),
                    cand(CandidateKind::ExternalRedirect, "https://gleam.io/x", 0.6, 3),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Exhausted);
        assert_eq!(runner.attempted.len(), 2);
    }

    #[tokio::test]
    async fn test_advanced_seeds_children_and_descends() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new()
            .on(
                "/ps/15630",
                Ok(AttemptOutcome::Advanced(vec![cand(
                    CandidateKind::DomForm,
                    "form:nth-of-type(1)",
                    0.5,
                    2,
                )])),
            )
            .on(
                "form:nth-of-type(1)",
                Ok(AttemptOutcome::FormFilled(empty_fill())),
            );
        let traversal = engine
            .explore(
                &target(),
                vec![cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1)],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Success);
        assert_eq!(
            runner.attempted,
            vec!["/ps/15630", "form:nth-of-type(1)"]
        );
        // The winning candidate is the leaf, not the link that led there.
        assert_eq!(
            traversal.result.winning.unwrap().kind,
            CandidateKind::DomForm
        );
    }

    #[tokio::test]
    async fn test_failed_subtree_pops_to_parent_sibling() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new()
            .on(
                "/ps/15630",
                Ok(AttemptOutcome::Advanced(vec![cand(
                    CandidateKind::DomForm,
                    "form:nth-of-type(1)",
                    0.5,
                    2,
                )])),
            )
            // The form inside the advanced page fails...
            .on(
                "form:nth-of-type(1)",
                Err(AttemptError::TooFewFields { found: 0, need: 1 }),
            )
            // ...so the engine pops back and tries the root's next sibling.
            .on("/ps/15595", Ok(AttemptOutcome::FormFilled(empty_fill())));
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1),
                    cand(CandidateKind::GenericLink, "/ps/15595", 0.85, 2),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Success);
        assert_eq!(
            runner.attempted,
            vec!["/ps/15630", "form:nth-of-type(1)", "/ps/15595"]
        );
    }

    #[tokio::test]
    async fn test_visited_set_prevents_reattempt() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        // The same form locator appears both at the root and inside the
        // advanced page (cyclic frame reference shape).
        let mut runner = ScriptedRunner::new()
            .on(
                "/ps/15630",
                Ok(AttemptOutcome::Advanced(vec![
                    cand(CandidateKind::DomForm, "form:nth-of-type(1)", 0.9, 2),
                ])),
            )
            .on(
                "form:nth-of-type(1)",
                Err(AttemptError::TooFewFields { found: 0, need: 1 }),
            );
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1),
                    cand(CandidateKind::DomForm, "form:nth-of-type(1)", 0.5, 2),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Exhausted);
        // Attempted once; the second occurrence was skipped, not attempted.
        let attempted_form = runner
            .attempted
            .iter()
            .filter(|l| *l == "form:nth-of-type(1)")
            .count();
        assert_eq!(attempted_form, 1);
        assert!(traversal
            .attempts
            .iter()
            .any(|a| a.outcome == "skipped" && a.error.as_deref() == Some("duplicate candidate signature")));
    }

    #[tokio::test]
    async fn test_transient_error_retried_then_succeeds() {
        let c = EntrantConfig {
            transient_retries: 2,
            retry_backoff_ms: 1,
            ..EntrantConfig::default()
        };
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new()
            .on("/ps/15630", Err(AttemptError::Network("reset".into())))
            .on("/ps/15630", Ok(AttemptOutcome::FormFilled(empty_fill())));
        let traversal = engine
            .explore(
                &target(),
                vec![cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1)],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Success);
        assert_eq!(runner.attempted.len(), 2);
        // Retries collapse into a single successful trace entry.
        assert_eq!(traversal.attempts.len(), 1);
        assert_eq!(traversal.attempts[0].outcome, "success");
    }

    #[tokio::test]
    async fn test_structural_error_not_retried() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new().on(
            "/ps/15630",
            Err(AttemptError::LocatorNotFound {
                locator: "/ps/15630".into(),
            }),
        );
        let traversal = engine
            .explore(
                &target(),
                vec![cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1)],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Exhausted);
        assert_eq!(runner.attempted.len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_and_skips_siblings() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        let mut runner = ScriptedRunner::new().on(
            "/login",
            Err(AttemptError::AuthRequired {
                url: "https://a.com/login".into(),
            }),
        );
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::SpecificLink, "/login", 0.98, 1),
                    cand(CandidateKind::GenericLink, "/ps/15595", 0.85, 2),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Exhausted);
        // Only the fatal candidate was attempted; the sibling was skipped.
        assert_eq!(runner.attempted, vec!["/login"]);
        assert!(traversal
            .attempts
            .iter()
            .any(|a| a.outcome == "skipped"));
    }

    #[tokio::test]
    async fn test_fatal_abort_skips_pending_ancestor_siblings() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        // Descend into the advanced page, then die fatally on its first
        // form. Untried candidates at both depths must show as skipped.
        let mut runner = ScriptedRunner::new()
            .on(
                "/ps/15630",
                Ok(AttemptOutcome::Advanced(vec![
                    cand(CandidateKind::DomForm, "form:nth-of-type(1)", 0.9, 2),
                    cand(CandidateKind::DomForm, "form:nth-of-type(2)", 0.5, 2),
                ])),
            )
            .on(
                "form:nth-of-type(1)",
                Err(AttemptError::AuthRequired {
                    url: "https://a.com/login".into(),
                }),
            );
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1),
                    cand(CandidateKind::GenericLink, "/ps/15595", 0.85, 2),
                ],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Exhausted);
        let skipped: Vec<&str> = traversal
            .attempts
            .iter()
            .filter(|a| a.outcome == "skipped")
            .map(|a| a.candidate.locator.as_str())
            .collect();
        assert!(skipped.contains(&"form:nth-of-type(2)"));
        assert!(skipped.contains(&"/ps/15595"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_without_further_attempts() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);

        /// Runner whose first attempt never completes.
        struct HangingRunner {
            attempted: usize,
        }

        #[async_trait]
        impl CandidateRunner for HangingRunner {
            async fn attempt(
                &mut self,
                _candidate: &EntryCandidate,
            ) -> Result<AttemptOutcome, AttemptError> {
                self.attempted += 1;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("attempt outlived the deadline")
            }
        }

        let mut runner = HangingRunner { attempted: 0 };
        let traversal = engine
            .explore(
                &target(),
                vec![
                    cand(CandidateKind::SpecificLink, "/ps/15630", 0.98, 1),
                    cand(CandidateKind::GenericLink, "/ps/15595", 0.85, 2),
                ],
                &mut runner,
                Instant::now() + Duration::from_millis(100),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Cancelled);
        assert_eq!(runner.attempted, 1);
        // The untried sibling shows up as skipped in the trace.
        assert!(traversal
            .attempts
            .iter()
            .any(|a| a.outcome == "skipped" && a.candidate.locator == "/ps/15595"));
    }

    #[tokio::test]
    async fn test_depth_bound_stops_descent() {
        let c = cfg();
        let engine = DecisionEngine::new(&c);
        // Every attempt advances to a fresh candidate, forever.
        struct EndlessRunner {
            n: usize,
        }

        #[async_trait]
        impl CandidateRunner for EndlessRunner {
            async fn attempt(
                &mut self,
                _candidate: &EntryCandidate,
            ) -> Result<AttemptOutcome, AttemptError> {
                self.n += 1;
                Ok(AttemptOutcome::Advanced(vec![EntryCandidate {
                    kind: CandidateKind::GenericLink,
                    locator: format!("/hop/{}", self.n),
                    confidence: 0.5,
                    priority: 2,
                }]))
            }
        }

        let mut runner = EndlessRunner { n: 0 };
        let traversal = engine
            .explore(
                &target(),
                vec![cand(CandidateKind::GenericLink, "/hop/0", 0.5, 2)],
                &mut runner,
                deadline(),
            )
            .await;
        assert_eq!(traversal.result.status, EntryStatus::Exhausted);
        // Root child is depth 1; descent stops at CandidateKind::COUNT.
        assert!(runner.n <= CandidateKind::COUNT);
    }
}
