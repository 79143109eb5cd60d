// query.rs — Audit history queries.
//
// The log stores checks and resolutions as separate entries. `materialize`
// folds them into the current view of each check: a resolved check shows
// its terminal verdict and carries the Resolution that produced it. Only
// the first resolution of a pending check counts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sov_policy::model::same_code;
use sov_policy::{SectorMode, Verdict};

use crate::check::ComplianceCheck;
use crate::entry::{AuditEntry, AuditRecord};

/// Default number of checks returned per page.
pub const DEFAULT_PAGE_LIMIT: usize = 100;
/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Filters for audit history. Every field is optional; absent means any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFilter {
    pub tenant_id: Option<String>,
    pub verdict: Option<Verdict>,
    pub sector_mode: Option<SectorMode>,
    pub source_country: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl CheckFilter {
    pub fn matches(&self, check: &ComplianceCheck) -> bool {
        self.tenant_id
            .as_ref()
            .map_or(true, |tenant| *tenant == check.tenant_id)
            && self.verdict.map_or(true, |v| v == check.result.verdict)
            && self.sector_mode.map_or(true, |m| m == check.sector_mode)
            && self
                .source_country
                .as_deref()
                .map_or(true, |c| same_code(c, &check.request.source_country))
            && self.since.map_or(true, |since| check.timestamp >= since)
            && self.until.map_or(true, |until| check.timestamp <= until)
    }
}

/// Offset/limit pagination over newest-first results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Fold resolutions into their checks, preserving append order.
pub fn materialize(entries: &[AuditEntry]) -> Vec<ComplianceCheck> {
    let mut checks: Vec<ComplianceCheck> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for entry in entries {
        match &entry.record {
            AuditRecord::Check(check) => {
                // A replayed check may already be present; keep the first copy.
                if !index.contains_key(&check.check_id) {
                    index.insert(check.check_id, checks.len());
                    let mut check = check.clone();
                    check.audit_pending = false;
                    checks.push(check);
                }
            }
            AuditRecord::Resolution(resolution) => {
                let Some(&i) = index.get(&resolution.check_id) else {
                    tracing::warn!(
                        check_id = %resolution.check_id,
                        "resolution references unknown check, ignoring"
                    );
                    continue;
                };
                let check = &mut checks[i];
                if check.resolution.is_none() && check.is_pending() {
                    check.result.verdict = resolution.decision.verdict();
                    check.resolution = Some(resolution.clone());
                }
            }
        }
    }

    checks
}

/// Current view of one check.
pub fn find_check(entries: &[AuditEntry], check_id: Uuid) -> Option<ComplianceCheck> {
    materialize(entries)
        .into_iter()
        .find(|c| c.check_id == check_id)
}

/// Filtered, paginated history, newest first.
pub fn query(entries: &[AuditEntry], filter: &CheckFilter, page: Page) -> Vec<ComplianceCheck> {
    let limit = page.limit.clamp(1, MAX_PAGE_LIMIT);
    let mut checks = materialize(entries);
    checks.retain(|c| filter.matches(c));
    checks.reverse();
    checks.into_iter().skip(page.offset).take(limit).collect()
}
