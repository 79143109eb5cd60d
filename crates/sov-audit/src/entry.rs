// entry.rs — Audit log entry and hash chaining.
//
// Every entry carries `previous_hash`, the SHA-256 of the previous entry's
// raw JSON line. Inserting, deleting or editing a line breaks the chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::check::{ComplianceCheck, Resolution};

/// What an entry records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    /// A check produced by the evaluation pipeline.
    Check(ComplianceCheck),
    /// An approver resolved a pending check.
    Resolution(Resolution),
}

impl AuditRecord {
    /// The check this record belongs to.
    pub fn check_id(&self) -> Uuid {
        match self {
            AuditRecord::Check(check) => check.check_id,
            AuditRecord::Resolution(resolution) => resolution.check_id,
        }
    }
}

/// One line in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// Hash of the previous line. None for the first entry.
    pub previous_hash: Option<String>,
    pub record: AuditRecord,
}

impl AuditEntry {
    pub fn new(record: AuditRecord, previous_hash: Option<String>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            previous_hash,
            record,
        }
    }
}

/// Lowercase hex SHA-256 of a serialized line.
pub fn line_hash(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    format!("{:x}", hasher.finalize())
}
