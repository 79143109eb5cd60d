// error.rs — Audit log errors.
//
// A failed append is retried by the engine and, when retries run out,
// deferred; none of these ever changes a verdict.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, appending to or verifying the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file (or its parent directory) could not be opened or created.
    #[error("cannot open compliance audit log {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error while appending or reading lines.
    #[error("audit log I/O failed: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// A line is not a valid entry, or an entry could not be encoded.
    #[error("malformed audit entry: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The hash chain is broken at `line`.
    #[error("audit chain broken at line {line}: previous hash should be {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// The backing store refused the write (e.g. unavailable or read-only).
    #[error("audit store unavailable: {0}")]
    Unavailable(String),

    /// The log's writer lock was poisoned by a panicking writer.
    #[error("audit log lock poisoned: {0}")]
    LockPoisoned(String),
}
