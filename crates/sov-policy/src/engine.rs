// engine.rs — The evaluation pipeline.
//
// Every compliance decision flows through `evaluate()`:
//
//   Residency → Geographic → Sector → aggregate
//
// Each evaluator reads the same snapshot and none sees another's output,
// so their order only fixes the order of findings in the result. Nothing
// here performs I/O; the same snapshot and request always produce the
// same result.

use crate::finding::Findings;
use crate::request::EvaluationRequest;
use crate::store::PolicySnapshot;
use crate::verdict::{aggregate, ComplianceResult};
use crate::{geo, residency, sector};

/// Evaluate a request against a policy snapshot.
pub fn evaluate(snapshot: &PolicySnapshot, request: &EvaluationRequest) -> ComplianceResult {
    let mut findings = Findings::default();
    findings.extend(residency::evaluate(snapshot, request));
    findings.extend(geo::evaluate(snapshot, request));
    findings.extend(sector::evaluate(snapshot, request));

    let result = aggregate(findings, request.review_required);
    tracing::debug!(
        snapshot_version = snapshot.version,
        operation = %request.operation,
        verdict = %result.verdict,
        violations = result.violations.len(),
        conditions = result.conditions.len(),
        "evaluated compliance request"
    );
    result
}
