// check.rs — Compliance check and resolution records.
//
// A ComplianceCheck is written once by the evaluation pipeline and never
// rewritten. Resolving a pending check appends a separate Resolution that
// references it; readers fold the two together (see `query::materialize`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sov_policy::{ComplianceResult, EvaluationRequest, PolicySnapshot, SectorMode, Verdict};

/// One immutable evaluation record: inputs, snapshot reference and verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub check_id: Uuid,
    pub tenant_id: String,
    pub request: EvaluationRequest,
    /// The sector mode the request resolved to.
    pub sector_mode: SectorMode,
    /// Version of the policy snapshot the check was evaluated against.
    pub policy_version: u64,
    pub policy_digest: String,
    pub result: ComplianceResult,
    pub timestamp: DateTime<Utc>,

    /// Set when the audit write exhausted its retries and the check is
    /// queued for replay.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub audit_pending: bool,

    /// Present only in materialized views of a resolved check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl ComplianceCheck {
    pub fn new(
        tenant_id: impl Into<String>,
        request: EvaluationRequest,
        snapshot: &PolicySnapshot,
        result: ComplianceResult,
    ) -> Self {
        let (sector_mode, _) = request.sector();
        Self {
            check_id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            request,
            sector_mode,
            policy_version: snapshot.version,
            policy_digest: snapshot.digest.clone(),
            result,
            timestamp: Utc::now(),
            audit_pending: false,
            resolution: None,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.result.verdict
    }

    pub fn is_pending(&self) -> bool {
        self.result.verdict == Verdict::PendingApproval
    }
}

/// An approver's terminal decision on a pending check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Allow,
    Deny,
}

impl ApprovalDecision {
    pub fn verdict(&self) -> Verdict {
        match self {
            ApprovalDecision::Allow => Verdict::Allowed,
            ApprovalDecision::Deny => Verdict::Denied,
        }
    }
}

/// Linked record that moves a pending check to a terminal verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub resolution_id: Uuid,
    pub check_id: Uuid,
    pub decision: ApprovalDecision,
    pub approver: String,
    #[serde(default)]
    pub note: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    pub fn new(check_id: Uuid, decision: ApprovalDecision, approver: impl Into<String>) -> Self {
        Self {
            resolution_id: Uuid::new_v4(),
            check_id,
            decision,
            approver: approver.into(),
            note: None,
            resolved_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_maps_to_terminal_verdict() {
        assert_eq!(ApprovalDecision::Allow.verdict(), Verdict::Allowed);
        assert_eq!(ApprovalDecision::Deny.verdict(), Verdict::Denied);
        assert!(ApprovalDecision::Deny.verdict().is_terminal());
    }

    #[test]
    fn resolution_builder_sets_note() {
        let id = Uuid::new_v4();
        let r = Resolution::new(id, ApprovalDecision::Allow, "officer-7").with_note("signed");
        assert_eq!(r.check_id, id);
        assert_eq!(r.note.as_deref(), Some("signed"));
    }

    #[test]
    fn decision_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&ApprovalDecision::Deny).unwrap(),
            "\"deny\""
        );
    }
}
