use thiserror::Error;
use uuid::Uuid;

/// Unified error type for the entire Braid runtime.
///
/// The taxonomy matters to callers: validation failures are final, provider
/// and reasoning failures are retryable by caller policy, and consistency
/// failures mean "re-read current state and retry the whole operation".
#[derive(Error, Debug)]
pub enum BraidError {
    // ── Local, immediate failures (no retry) ───────────────────
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown identity: {0}")]
    UnknownIdentity(Uuid),

    // ── External dependency failures (caller may retry) ────────
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("reasoning layer error: {0}")]
    Reasoning(String),

    // ── Storage failures ───────────────────────────────────────
    #[error("concurrent edit conflict: {0}")]
    Consistency(String),

    #[error("memory error: {0}")]
    Memory(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl BraidError {
    /// Whether the caller may sensibly retry the failed operation as-is.
    ///
    /// Consistency conflicts are retryable too, but only after the caller has
    /// re-read current state, so they are reported separately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BraidError::Provider(_) | BraidError::Reasoning(_))
    }
}

pub type Result<T> = std::result::Result<T, BraidError>;
