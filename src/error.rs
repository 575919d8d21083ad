//! Attempt error taxonomy.
//!
//! Three classes drive the engine's control flow: Transient errors are
//! retried with backoff before the candidate fails, Structural errors fail
//! the candidate immediately and trigger backtracking, Fatal errors abort
//! the whole traversal.

use thiserror::Error;

/// How the engine should react to an [`AttemptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry a bounded number of times with backoff, then fail the candidate.
    Transient,
    /// Fail the candidate immediately and backtrack.
    Structural,
    /// Abort the target's traversal; never retried.
    Fatal,
}

/// Error from one candidate attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("navigation timed out after {timeout_ms}ms: {url}")]
    NavTimeout { url: String, timeout_ms: u64 },

    #[error("network failure: {0}")]
    Network(String),

    #[error("locator not found within wait bound: {locator}")]
    LocatorNotFound { locator: String },

    #[error("page yielded {found} classifiable fields, need at least {need}")]
    TooFewFields { found: usize, need: usize },

    #[error("frame traversal exceeded depth {depth}")]
    FrameDepthExceeded { depth: u8 },

    #[error("authentication required and unsupported: {url}")]
    AuthRequired { url: String },

    #[error("target deadline exceeded")]
    DeadlineExceeded,

    #[error("browser failure: {0}")]
    Browser(#[from] anyhow::Error),
}

impl AttemptError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AttemptError::NavTimeout { .. } | AttemptError::Network(_) => ErrorClass::Transient,
            AttemptError::LocatorNotFound { .. }
            | AttemptError::TooFewFields { .. }
            | AttemptError::FrameDepthExceeded { .. } => ErrorClass::Structural,
            AttemptError::AuthRequired { .. } | AttemptError::DeadlineExceeded => ErrorClass::Fatal,
            // Unclassified browser errors are treated as transient: the page
            // may simply not have settled yet.
            AttemptError::Browser(_) => ErrorClass::Transient,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}
