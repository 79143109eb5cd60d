// error.rs — Error types for the policy subsystem.
//
// Every variant here is an administrator-facing configuration problem.
// Rule mismatches during evaluation are never errors; they surface as
// `Violation` data in the result.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::SectorMode;

/// Errors that can occur while loading, validating or publishing policy data.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Two active geo restrictions cover the same (country, sector mode) pair.
    #[error(
        "conflicting geo restrictions '{first}' and '{second}' for country '{country}' under {mode}"
    )]
    ConflictingRestriction {
        country: String,
        mode: SectorMode,
        first: String,
        second: String,
    },

    /// Two enabled residency policies claim the same region.
    #[error("region '{region}' is claimed by enabled policies '{first}' and '{second}'")]
    DuplicateRegion {
        region: String,
        first: String,
        second: String,
    },

    /// A sector mode is configured more than once.
    #[error("sector mode {0} is configured more than once")]
    DuplicateSectorMode(SectorMode),

    /// A record is missing a field the store needs to index it.
    #[error("invalid {kind} '{id}': {reason}")]
    InvalidRecord {
        kind: &'static str,
        id: String,
        reason: String,
    },

    /// A sector mode string did not match any known mode (strict parsing only).
    #[error("unknown sector mode '{0}'")]
    UnknownSectorMode(String),

    /// Failed to read a policy file.
    #[error("failed to read policy file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse a policy file.
    #[error("failed to parse policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The store's writer lock was poisoned by a panicking publisher.
    #[error("policy store lock poisoned: {0}")]
    LockPoisoned(String),
}
