//! SiteMemory — the append-only log of past entry traces.
//!
//! This is the system's only durable state. Completed traversals are
//! appended keyed by site signature; nothing is ever updated or deleted.
//! The candidate generator reads the most recent successful entry per
//! signature and boosts that candidate kind on the next run.
//!
//! Writes are serialized through a single mutex-guarded connection, so
//! concurrent workers finishing at the same time never interleave.

use crate::model::{AttemptRecord, CandidateKind, EntryResult, EntryStatus, SiteSignature};
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The boost hint read back by the candidate generator: what worked last
/// time on this site signature.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHint {
    pub kind: CandidateKind,
    pub locator: String,
}

/// One appended trace row, as read back for diagnostics.
#[derive(Debug, Clone)]
pub struct TraceRow {
    pub signature: String,
    pub url: String,
    pub status: EntryStatus,
    pub winning_kind: Option<CandidateKind>,
    pub winning_locator: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    pub recorded_at: String,
}

/// Append/read store over the entry-trace log.
pub struct SiteMemory {
    conn: Mutex<Connection>,
}

impl SiteMemory {
    /// Open (or create) the memory database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create memory dir: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open site memory: {}", path.display()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory site memory")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default store at `~/.entrant/memory.db`.
    pub fn default_store() -> Result<Self> {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".entrant")
            .join("memory.db");
        Self::open(&path)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entry_trace (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                signature       TEXT NOT NULL,
                url             TEXT NOT NULL,
                status          TEXT NOT NULL,
                winning_kind    TEXT,
                winning_locator TEXT,
                attempts_json   TEXT NOT NULL,
                recorded_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trace_signature
                ON entry_trace (signature, id);",
        )
        .context("failed to initialize site memory schema")?;
        Ok(())
    }

    /// Append one completed traversal. Never overwrites prior rows.
    pub fn record(&self, result: &EntryResult, attempts: &[AttemptRecord]) -> Result<()> {
        let attempts_json =
            serde_json::to_string(attempts).context("failed to serialize attempt trace")?;
        let status = match result.status {
            EntryStatus::Success => "success",
            EntryStatus::Exhausted => "exhausted",
            EntryStatus::Cancelled => "cancelled",
        };
        let conn = self.conn.lock().expect("site memory mutex poisoned");
        conn.execute(
            "INSERT INTO entry_trace
                (signature, url, status, winning_kind, winning_locator, attempts_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                result.signature.to_string(),
                result.url,
                status,
                result.winning.as_ref().map(|c| c.kind.as_str()),
                result.winning.as_ref().map(|c| c.locator.clone()),
                attempts_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .context("failed to append entry trace")?;
        tracing::debug!(signature = %result.signature, status, "trace recorded");
        Ok(())
    }

    /// Most recent successful candidate for the signature, if any.
    pub fn latest_success(&self, signature: &SiteSignature) -> Result<Option<MemoryHint>> {
        let conn = self.conn.lock().expect("site memory mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT winning_kind, winning_locator FROM entry_trace
             WHERE signature = ?1 AND status = 'success' AND winning_kind IS NOT NULL
             ORDER BY id DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row([signature.to_string()], |row| {
                let kind: String = row.get(0)?;
                let locator: String = row.get(1)?;
                Ok((kind, locator))
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        Ok(row.and_then(|(kind, locator)| {
            CandidateKind::from_str_opt(&kind).map(|kind| MemoryHint { kind, locator })
        }))
    }

    /// All trace rows for a signature, oldest first. Diagnostic path.
    pub fn traces(&self, signature: &SiteSignature) -> Result<Vec<TraceRow>> {
        let conn = self.conn.lock().expect("site memory mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT signature, url, status, winning_kind, winning_locator, attempts_json, recorded_at
             FROM entry_trace WHERE signature = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([signature.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (signature, url, status, kind, locator, attempts_json, recorded_at) = row?;
            let status = match status.as_str() {
                "success" => EntryStatus::Success,
                "cancelled" => EntryStatus::Cancelled,
                _ => EntryStatus::Exhausted,
            };
            out.push(TraceRow {
                signature,
                url,
                status,
                winning_kind: kind.as_deref().and_then(CandidateKind::from_str_opt),
                winning_locator: locator,
                attempts: serde_json::from_str(&attempts_json).unwrap_or_default(),
                recorded_at,
            });
        }
        Ok(out)
    }
}
