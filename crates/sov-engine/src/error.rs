// error.rs — Error types for the compliance engine.
//
// Rule mismatches are never errors; they are violations inside the result.
// A deferred audit write is not an error either: the check comes back with
// `audit_pending` set and is queued for replay.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use sov_policy::Verdict;

/// Errors surfaced by the compliance engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request is missing required fields; nothing was evaluated or recorded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An approval was attempted on a check that is no longer pending.
    #[error("check {check_id} is already resolved as {verdict}")]
    AlreadyResolved { check_id: Uuid, verdict: Verdict },

    /// No check with this ID exists in the audit log.
    #[error("check not found: {0}")]
    CheckNotFound(Uuid),

    /// A policy write was rejected (conflicting restrictions, duplicate regions…).
    #[error("configuration error: {0}")]
    Configuration(#[from] sov_policy::PolicyError),

    /// The audit store failed and the operation could not be deferred.
    #[error("audit error: {0}")]
    Audit(#[from] sov_audit::AuditError),

    /// The audit store is down and the replay queue is full; the check was
    /// evaluated but cannot be recorded, so it is not returned.
    #[error("audit replay queue is full ({limit} records); audit store unavailable")]
    AuditBacklogFull { limit: usize },

    /// Failed to read the engine config file.
    #[error("failed to read engine config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the engine config file.
    #[error("failed to parse engine config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// An internal lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}
