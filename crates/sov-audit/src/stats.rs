// stats.rs — Aggregate statistics rebuilt from the audit log.
//
// Stats are never authoritative: they are a pure function of the log's
// entries (plus the active policy count from the current snapshot), so they
// can be thrown away and rebuilt at any time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sov_policy::{SectorMode, Severity, Verdict};

use crate::check::ComplianceCheck;
use crate::entry::AuditEntry;
use crate::query::materialize;

/// Derived counters over the audit history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStats {
    pub total_checks: u64,
    pub active_policies: u64,
    pub checks_allowed: u64,
    pub checks_denied: u64,
    pub checks_conditional: u64,
    pub checks_pending: u64,
    pub violations_by_severity: BTreeMap<Severity, u64>,
    pub checks_by_sector_mode: BTreeMap<SectorMode, u64>,
    /// Number of log entries the stats were computed from.
    pub audit_entries: u64,
    pub computed_at: DateTime<Utc>,
}

impl ComplianceStats {
    /// Rebuild stats from raw log entries.
    pub fn from_entries(entries: &[AuditEntry], active_policies: usize) -> Self {
        let mut stats = Self::from_checks(&materialize(entries), active_policies);
        stats.audit_entries = entries.len() as u64;
        stats
    }

    /// Compute stats from materialized checks.
    pub fn from_checks(checks: &[ComplianceCheck], active_policies: usize) -> Self {
        let mut stats = ComplianceStats {
            total_checks: 0,
            active_policies: active_policies as u64,
            checks_allowed: 0,
            checks_denied: 0,
            checks_conditional: 0,
            checks_pending: 0,
            violations_by_severity: Severity::all().iter().map(|s| (*s, 0)).collect(),
            checks_by_sector_mode: SectorMode::all().iter().map(|m| (*m, 0)).collect(),
            audit_entries: 0,
            computed_at: Utc::now(),
        };

        for check in checks {
            stats.total_checks += 1;
            match check.result.verdict {
                Verdict::Allowed => stats.checks_allowed += 1,
                Verdict::Denied => stats.checks_denied += 1,
                Verdict::Conditional => stats.checks_conditional += 1,
                Verdict::PendingApproval => stats.checks_pending += 1,
            }
            for violation in &check.result.violations {
                *stats
                    .violations_by_severity
                    .entry(violation.severity)
                    .or_insert(0) += 1;
            }
            *stats
                .checks_by_sector_mode
                .entry(check.sector_mode)
                .or_insert(0) += 1;
        }

        stats
    }

    /// The per-verdict counters add up to the total.
    pub fn is_consistent(&self) -> bool {
        self.checks_allowed + self.checks_denied + self.checks_conditional + self.checks_pending
            == self.total_checks
    }
}
