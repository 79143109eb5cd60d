// verdict.rs — Verdict aggregation.
//
// Combines evaluator findings into one ComplianceResult. First match wins:
//
// 1. Any critical violation → Denied
// 2. Sector sign-off forced, or human review flagged → PendingApproval
// 3. Any high/medium violation, or any condition → Conditional
// 4. Otherwise → Allowed
//
// Violations are stable-sorted by severity (most severe first); ties keep
// evaluator order (residency, geographic, sector). The function is pure:
// identical findings always produce an identical result.

use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::finding::{Condition, Findings, Severity, Violation};

/// The decision for a compliance check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Allowed,
    Denied,
    Conditional,
    #[serde(alias = "pending_approval")]
    PendingApproval,
}

impl Verdict {
    pub fn all() -> &'static [Verdict] {
        &[
            Self::Allowed,
            Self::Denied,
            Self::Conditional,
            Self::PendingApproval,
        ]
    }

    /// Only pending-approval checks can still change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::PendingApproval)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allowed => write!(f, "allowed"),
            Verdict::Denied => write!(f, "denied"),
            Verdict::Conditional => write!(f, "conditional"),
            Verdict::PendingApproval => write!(f, "pending-approval"),
        }
    }
}

/// The verdict plus every violation and condition that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub verdict: Verdict,
    pub violations: Vec<Violation>,
    pub conditions: Vec<Condition>,
}

impl ComplianceResult {
    pub fn highest_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

/// Aggregate findings (already concatenated in evaluator order) into a result.
pub fn aggregate(findings: Findings, review_required: bool) -> ComplianceResult {
    let Findings {
        mut violations,
        conditions,
        sign_off_required,
    } = findings;

    // `sort_by_key` is stable, so equal severities keep evaluator order.
    violations.sort_by_key(|v| Reverse(v.severity));

    let highest = violations.first().map(|v| v.severity);
    let verdict = if highest == Some(Severity::Critical) {
        Verdict::Denied
    } else if sign_off_required || review_required {
        Verdict::PendingApproval
    } else if highest.is_some_and(|s| s >= Severity::Medium) || !conditions.is_empty() {
        Verdict::Conditional
    } else {
        Verdict::Allowed
    };

    ComplianceResult {
        verdict,
        violations,
        conditions,
    }
}
