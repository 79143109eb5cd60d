//! # sov-audit
//!
//! Append-only compliance check log, audit queries and statistics.
//!
//! Every evaluated [`ComplianceCheck`] is recorded as an [`AuditEntry`] in a
//! JSONL log. Entries are hash-chained for tamper detection. Approving a
//! pending check appends a linked [`Resolution`]; the original record is
//! never rewritten. [`ComplianceStats`] are rebuilt from the log, which is
//! the single source of truth.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use sov_audit::{AuditLog, AuditSink, CheckFilter, Page};
//!
//! let log = AuditLog::open("/tmp/compliance-audit.jsonl").unwrap();
//! let entries = log.entries().unwrap();
//! let recent = sov_audit::query(&entries, &CheckFilter::default(), Page::default());
//! println!("{} checks", recent.len());
//! ```

pub mod check;
pub mod entry;
pub mod error;
pub mod log;
pub mod query;
pub mod stats;

#[cfg(test)]
mod fixtures;

pub use check::{ApprovalDecision, ComplianceCheck, Resolution};
pub use entry::{AuditEntry, AuditRecord};
pub use error::AuditError;
pub use log::{AuditLog, AuditSink, MemoryAuditLog};
pub use query::{find_check, materialize, query, CheckFilter, Page};
pub use stats::ComplianceStats;
