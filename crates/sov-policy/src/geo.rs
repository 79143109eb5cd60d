// geo.rs — Geographic restriction evaluator.
//
// Looks up active restrictions on the source and target countries that
// apply under the request's sector mode. A prohibited country is an
// absolute block; a restricted one asks for manual approval and raises a
// high (not critical) violation so the verdict degrades to conditional.
//
// This runs independently of the residency cross-border flag: a
// prohibition here denies even when the residency policy allows transfers.

use crate::finding::{ConditionKind, Evaluator, Findings, Severity, Violation, ViolationCode};
use crate::model::{same_code, RestrictionLevel};
use crate::request::EvaluationRequest;
use crate::store::PolicySnapshot;

const EVALUATOR: Evaluator = Evaluator::Geographic;

/// Evaluate geographic restrictions. Pure over the snapshot.
pub fn evaluate(snapshot: &PolicySnapshot, request: &EvaluationRequest) -> Findings {
    let mut findings = Findings::default();
    let (mode, _) = request.sector();

    let mut countries = vec![request.source_country.trim()];
    if let Some(target) = request.target() {
        if !same_code(target, &request.source_country) {
            countries.push(target);
        }
    }

    for country in countries {
        for restriction in snapshot.restrictions_for(country, mode) {
            match restriction.restriction_level {
                RestrictionLevel::Prohibited => {
                    findings.violation(Violation::new(
                        EVALUATOR,
                        ViolationCode::GeoProhibited,
                        Severity::Critical,
                        format!(
                            "operations touching '{}' are prohibited under {} ({})",
                            country, mode, restriction.id
                        ),
                    ));
                }
                RestrictionLevel::Restricted => {
                    findings.condition(
                        EVALUATOR,
                        ConditionKind::ManualApproval,
                        format!(
                            "requires manual approval for operations touching {} under {}",
                            country, mode
                        ),
                    );
                    findings.violation(Violation::new(
                        EVALUATOR,
                        ViolationCode::GeoRestricted,
                        Severity::High,
                        format!(
                            "'{}' is restricted under {} ({})",
                            country, mode, restriction.id
                        ),
                    ));
                }
                RestrictionLevel::None => {}
            }
        }
    }

    tracing::debug!(
        violations = findings.violations.len(),
        conditions = findings.conditions.len(),
        "geographic evaluation complete"
    );
    findings
}
