// residency.rs — Data residency evaluator.
//
// Checks the request against the enabled residency policy for the source
// region:
//
// 1. No covering policy → NO_POLICY_DEFINED (low, never blocks)
// 2. Target on the policy's block list → TARGET_COUNTRY_BLOCKED (critical)
// 3. Border crossing while the policy forbids transfers → CROSS_BORDER_DENIED (critical)
// 4. Border crossing to a target outside a non-empty allow list → TARGET_NOT_ALLOWLISTED (high)
// 5. Storage outside the source while local storage is mandated → LOCAL_STORAGE_ONLY (critical)
// 6. Encryption mandated but not attested → ENCRYPTION_REQUIRED (medium)

use crate::finding::{Evaluator, Findings, Severity, Violation, ViolationCode};
use crate::model::{same_code, Operation};
use crate::request::EvaluationRequest;
use crate::store::PolicySnapshot;

const EVALUATOR: Evaluator = Evaluator::Residency;

/// Evaluate residency rules. Pure over the snapshot.
pub fn evaluate(snapshot: &PolicySnapshot, request: &EvaluationRequest) -> Findings {
    let mut findings = Findings::default();

    let Some(policy) = snapshot.matching_policy(&request.source_country, &request.data_types)
    else {
        findings.violation(Violation::new(
            EVALUATOR,
            ViolationCode::NoPolicyDefined,
            Severity::Low,
            format!(
                "no enabled residency policy covers {} data from '{}'",
                request.data_types.join(", "),
                request.source_country
            ),
        ));
        return findings;
    };

    let target = request.target();

    if request.crosses_border() {
        if let Some(target) = target {
            if policy
                .blocked_countries
                .iter()
                .any(|blocked| same_code(blocked, target))
            {
                findings.violation(Violation::new(
                    EVALUATOR,
                    ViolationCode::TargetCountryBlocked,
                    Severity::Critical,
                    format!("policy '{}' blocks transfers to '{}'", policy.id, target),
                ));
            }
        }

        if !policy.cross_border_transfer_allowed {
            findings.violation(Violation::new(
                EVALUATOR,
                ViolationCode::CrossBorderDenied,
                Severity::Critical,
                format!(
                    "policy '{}' forbids moving data out of '{}'{}",
                    policy.id,
                    policy.region,
                    target.map(|t| format!(" to '{}'", t)).unwrap_or_default()
                ),
            ));
        } else if let Some(target) = target {
            if !policy.allowed_countries.is_empty()
                && !policy
                    .allowed_countries
                    .iter()
                    .any(|allowed| same_code(allowed, target))
            {
                findings.violation(Violation::new(
                    EVALUATOR,
                    ViolationCode::TargetNotAllowlisted,
                    Severity::High,
                    format!(
                        "'{}' is not on the transfer allow list of policy '{}'",
                        target, policy.id
                    ),
                ));
            }
        }
    }

    if request.operation == Operation::DataStorage
        && request.leaves_source()
        && policy.local_storage_only
    {
        findings.violation(Violation::new(
            EVALUATOR,
            ViolationCode::LocalStorageOnly,
            Severity::Critical,
            format!(
                "policy '{}' requires data from '{}' to be stored locally",
                policy.id, policy.region
            ),
        ));
    }

    if policy.encryption_required && !request.attests_encryption() {
        findings.violation(Violation::new(
            EVALUATOR,
            ViolationCode::EncryptionRequired,
            Severity::Medium,
            format!("policy '{}' requires encryption", policy.id),
        ));
    }

    tracing::debug!(
        policy = %policy.id,
        violations = findings.violations.len(),
        "residency evaluation complete"
    );
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataResidencyPolicy, EncryptionStandard, PolicySet};
    use crate::store::PolicyStore;

    fn sa_policy() -> DataResidencyPolicy {
        DataResidencyPolicy {
            id: "sa-pdpl".to_string(),
            region: "SA".to_string(),
            allowed_countries: vec![],
            blocked_countries: vec![],
            data_types: vec!["personal".to_string()],
            encryption_required: false,
            local_storage_only: false,
            cross_border_transfer_allowed: true,
            frameworks: vec![],
            enabled: true,
        }
    }

    fn snapshot_with(policy: DataResidencyPolicy) -> std::sync::Arc<PolicySnapshot> {
        let set = PolicySet {
            policies: vec![policy],
            ..PolicySet::default()
        };
        PolicyStore::new(set).unwrap().snapshot()
    }

    fn request(operation: Operation, target: Option<&str>) -> EvaluationRequest {
        EvaluationRequest {
            operation,
            source_country: "SA".to_string(),
            target_country: target.map(str::to_string),
            sector_mode: "civilian".to_string(),
            data_types: vec!["personal".to_string()],
            encryption: Some(EncryptionStandard::Aes256),
            audit_level: None,
            review_required: false,
        }
    }

    fn codes(findings: &Findings) -> Vec<ViolationCode> {
        findings.violations.iter().map(|v| v.code).collect()
    }

    #[test]
    fn no_policy_emits_low_visibility_note() {
        let snap = PolicyStore::new(PolicySet::default()).unwrap().snapshot();
        let findings = evaluate(&snap, &request(Operation::DataTransfer, Some("US")));
        assert_eq!(codes(&findings), vec![ViolationCode::NoPolicyDefined]);
        assert_eq!(findings.violations[0].severity, Severity::Low);
    }

    #[test]
    fn uncovered_data_type_counts_as_no_policy() {
        let snap = snapshot_with(sa_policy());
        let mut req = request(Operation::DataTransfer, Some("US"));
        req.data_types = vec!["telemetry".to_string()];
        assert_eq!(
            codes(&evaluate(&snap, &req)),
            vec![ViolationCode::NoPolicyDefined]
        );
    }

    #[test]
    fn cross_border_denied_when_policy_forbids() {
        let mut policy = sa_policy();
        policy.cross_border_transfer_allowed = false;
        let snap = snapshot_with(policy);

        let findings = evaluate(&snap, &request(Operation::CrossBorder, Some("US")));
        assert_eq!(codes(&findings), vec![ViolationCode::CrossBorderDenied]);
        assert_eq!(findings.violations[0].severity, Severity::Critical);
    }

    #[test]
    fn transfer_to_different_target_is_a_border_crossing() {
        let mut policy = sa_policy();
        policy.cross_border_transfer_allowed = false;
        let snap = snapshot_with(policy);

        let findings = evaluate(&snap, &request(Operation::DataTransfer, Some("AE")));
        assert_eq!(codes(&findings), vec![ViolationCode::CrossBorderDenied]);

        let findings = evaluate(&snap, &request(Operation::DataTransfer, Some("SA")));
        assert!(findings.violations.is_empty());
    }

    #[test]
    fn local_storage_only_blocks_remote_storage() {
        let mut policy = sa_policy();
        policy.local_storage_only = true;
        let snap = snapshot_with(policy);

        let remote = evaluate(&snap, &request(Operation::DataStorage, Some("DE")));
        assert!(codes(&remote).contains(&ViolationCode::LocalStorageOnly));

        let local = evaluate(&snap, &request(Operation::DataStorage, None));
        assert!(local.violations.is_empty());
    }

    #[test]
    fn encryption_required_without_attestation() {
        let mut policy = sa_policy();
        policy.encryption_required = true;
        let snap = snapshot_with(policy);

        let mut req = request(Operation::DataProcessing, None);
        req.encryption = None;
        let findings = evaluate(&snap, &req);
        assert_eq!(codes(&findings), vec![ViolationCode::EncryptionRequired]);
        assert_eq!(findings.violations[0].severity, Severity::Medium);

        req.encryption = Some(EncryptionStandard::Aes128);
        assert!(evaluate(&snap, &req).violations.is_empty());
    }

    #[test]
    fn blocked_and_allowlist_targets() {
        let mut policy = sa_policy();
        policy.blocked_countries = vec!["IR".to_string()];
        policy.allowed_countries = vec!["AE".to_string(), "BH".to_string()];
        let snap = snapshot_with(policy);

        let blocked = evaluate(&snap, &request(Operation::DataTransfer, Some("ir")));
        assert_eq!(
            codes(&blocked),
            vec![
                ViolationCode::TargetCountryBlocked,
                ViolationCode::TargetNotAllowlisted
            ]
        );

        let allowed = evaluate(&snap, &request(Operation::DataTransfer, Some("AE")));
        assert!(allowed.violations.is_empty());

        let outside = evaluate(&snap, &request(Operation::DataTransfer, Some("US")));
        assert_eq!(codes(&outside), vec![ViolationCode::TargetNotAllowlisted]);
    }
}
