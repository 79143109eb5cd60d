// fixtures.rs — Test helpers shared by the audit crate's unit tests.

use sov_policy::{
    ComplianceResult, EvaluationRequest, Operation, PolicySet, PolicyStore, Verdict,
};

use crate::check::ComplianceCheck;

pub(crate) fn sample_request(sector: &str) -> EvaluationRequest {
    EvaluationRequest {
        operation: Operation::DataTransfer,
        source_country: "SA".to_string(),
        target_country: Some("AE".to_string()),
        sector_mode: sector.to_string(),
        data_types: vec!["personal".to_string()],
        encryption: None,
        audit_level: None,
        review_required: false,
    }
}

pub(crate) fn sample_check(tenant: &str, verdict: Verdict) -> ComplianceCheck {
    let store = PolicyStore::new(PolicySet::default()).unwrap();
    ComplianceCheck::new(
        tenant,
        sample_request("civilian"),
        &store.snapshot(),
        ComplianceResult {
            verdict,
            violations: vec![],
            conditions: vec![],
        },
    )
}
