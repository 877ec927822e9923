//! Store error taxonomy

use neo4rs::Neo4jErrorKind;
use thiserror::Error;

/// Errors raised by the graph store and its session pool.
///
/// None of these terminate the process; they travel back to the operation that
/// triggered them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A retryable condition outlasted the retry policy
    #[error("store temporarily unavailable after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    /// Connecting or logging in failed for a non-retryable reason
    #[error("store session failed: {0}")]
    Session(String),

    /// A read query failed
    #[error("query failed: {0}")]
    Query(String),

    /// A mutation or delete failed; the transaction was rolled back
    #[error("write failed: {0}")]
    Write(String),

    /// The store answered with data that does not fit the model
    #[error("could not decode store response: {0}")]
    Decode(String),

    /// A schema statement was rejected
    #[error("schema declaration rejected: {0}")]
    Schema(String),

    /// A referenced entity does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// A uniqueness rule would be violated
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

/// Classify a driver error as retryable.
///
/// Server failures carry a typed status class; pool timeouts and dropped sockets
/// surface as connection or I/O errors. Message matching only covers server
/// errors whose code the driver could not classify.
pub(crate) fn is_transient(err: &neo4rs::Error) -> bool {
    match err {
        neo4rs::Error::Neo4j(e) => is_transient_kind(e.kind(), e.message()),
        neo4rs::Error::ConnectionError | neo4rs::Error::IOError { .. } => true,
        _ => false,
    }
}

fn is_transient_kind(kind: Neo4jErrorKind, message: &str) -> bool {
    match kind {
        Neo4jErrorKind::Transient => true,
        Neo4jErrorKind::Unknown => is_transient_message(message),
        _ => false,
    }
}

fn is_transient_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("transienterror")
        || lower.contains("please retry")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("timed out")
}

const CONSTRAINT_VIOLATION: &str = "Neo.ClientError.Schema.ConstraintValidationFailed";

/// A write rejected by a uniqueness constraint
pub(crate) fn is_constraint_violation(err: &neo4rs::Error) -> bool {
    match err {
        neo4rs::Error::Neo4j(e) => e.code() == CONSTRAINT_VIOLATION,
        _ => false,
    }
}
