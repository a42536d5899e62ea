//! # Engine Errors
//! Typed error kinds for the category loader, the match engine, and the
//! learning/persistence path.
//!
//! Most "failures" inside a turn are not errors at all: a missing variable
//! reads as empty, an unknown tag echoes itself, and a failed match falls
//! back to the default response. The variants here are the ones callers can
//! meaningfully distinguish at a boundary (loading, persistence, services).

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No category matched; callers substitute the default response.
    #[error("no category matched the input")]
    NoMatch,

    /// Rejected at load/learn time; loading continues with the next record.
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),

    /// The reduction chain hit the configured depth cap.
    #[error("recursion limit of {0} reached")]
    RecursionLimit(u32),

    #[error("service '{0}' failed: {1}")]
    Service(String, String),

    #[error("service '{0}' timed out")]
    ServiceTimeout(String),

    /// The in-memory effect is kept; only the durable write failed.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Unlearn target did not exist; treated as a no-op by callers.
    #[error("no category found for pattern '{0}'")]
    CategoryNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}
