// Copyright 2026 the Entrant Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Entrant event bus — typed events from every component.
//!
//! A `tokio::sync::broadcast` channel carrying [`EntrantEvent`] values.
//! Dashboards, log sinks, and tests subscribe independently; when no
//! subscribers exist, events are silently dropped (zero overhead).

use crate::model::EntryStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the runtime emits. Serialized to JSON for streaming consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntrantEvent {
    // ── Target Events ─────────────────────
    /// A worker picked up a target and began exploring.
    TargetStarted {
        target_id: String,
        url: String,
        signature: String,
    },
    /// Candidate generation finished for a page.
    CandidatesGenerated {
        target_id: String,
        count: usize,
        boosted_by_memory: bool,
    },
    /// One candidate attempt finished.
    CandidateAttempted {
        target_id: String,
        kind: String,
        locator: String,
        outcome: String,
    },
    /// Field classification finished for a reached form.
    FieldsClassified {
        target_id: String,
        scanned: usize,
        classified: usize,
        visual_fallback: bool,
    },
    /// A target reached a terminal status.
    TargetComplete {
        target_id: String,
        status: EntryStatus,
        fill_rate: Option<f32>,
        attempts: usize,
        elapsed_ms: u64,
    },

    // ── Memory Events ─────────────────────
    /// A trace was appended to site memory.
    MemoryRecorded {
        signature: String,
        status: EntryStatus,
    },

    // ── System Events ─────────────────────
    /// The runtime started processing a batch.
    BatchStarted { targets: usize, workers: usize },
    /// The whole batch finished.
    BatchComplete {
        targets: usize,
        succeeded: usize,
        exhausted: usize,
        cancelled: usize,
        total_ms: u64,
    },
}

/// The central event bus.
///
/// All components emit events through this bus. Consumers subscribe to
/// receive a stream of all events.
pub struct EventBus {
    sender: broadcast::Sender<EntrantEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: EntrantEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EntrantEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Check if an event belongs to a specific target.
pub fn event_matches_target(event: &EntrantEvent, target_id: &str) -> bool {
    match event {
        EntrantEvent::TargetStarted { target_id: t, .. }
        | EntrantEvent::CandidatesGenerated { target_id: t, .. }
        | EntrantEvent::CandidateAttempted { target_id: t, .. }
        | EntrantEvent::FieldsClassified { target_id: t, .. }
        | EntrantEvent::TargetComplete { target_id: t, .. } => t == target_id,
        // Memory and system events are not target-specific
        EntrantEvent::MemoryRecorded { .. }
        | EntrantEvent::BatchStarted { .. }
        | EntrantEvent::BatchComplete { .. } => true,
    }
}
