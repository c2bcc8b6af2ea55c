//! Error types shared across the ledger components.
//!
//! Each variant corresponds to one error kind the REST surface knows how to
//! map to a status code. Integrity findings (a broken chain, a divergent
//! mirror) are deliberately NOT errors: they are returned as response data so
//! clients can act on them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Client input is malformed (bad hash format, unknown enum value, ...).
    #[error("validation: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is illegal in the record's current state.
    #[error("illegal state transition: {0}")]
    State(String),

    /// A precondition on the operation's inputs failed (e.g. count below
    /// the requested threshold).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Missing, unknown or revoked API key.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// Authenticated, but the party's role does not allow this operation.
    #[error("forbidden: {0}")]
    Role(String),

    /// Too many requests from this client within the window.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Storage I/O or serialization failed; in-memory state was rolled back.
    #[error("persistence: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

impl LedgerError {
    /// Stable machine-readable kind, used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::State(_) => "state",
            LedgerError::Precondition(_) => "precondition",
            LedgerError::Auth(_) => "auth",
            LedgerError::Role(_) => "role",
            LedgerError::RateLimited(_) => "rate_limited",
            LedgerError::Persistence(_) => "persistence",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
