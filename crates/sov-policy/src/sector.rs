// sector.rs — Sector mode evaluator.
//
// Compares the attested encryption and audit level with the sector's
// minimums (a missing attestation is no claim and is not judged), checks that the source region's policy certifies the sector's
// required legal frameworks, and forces authority sign-off for sectors at
// `critical` security level or above.

use crate::finding::{ConditionKind, Evaluator, Findings, Severity, Violation, ViolationCode};
use crate::model::SectorMode;
use crate::request::EvaluationRequest;
use crate::store::PolicySnapshot;

const EVALUATOR: Evaluator = Evaluator::Sector;

/// Evaluate sector posture. Pure over the snapshot.
pub fn evaluate(snapshot: &PolicySnapshot, request: &EvaluationRequest) -> Findings {
    let mut findings = Findings::default();
    let (mode, recognized) = request.sector();

    if !recognized {
        tracing::warn!(
            sector_mode = %request.sector_mode,
            "unknown sector mode, applying civilian defaults"
        );
        findings.violation(Violation::new(
            EVALUATOR,
            ViolationCode::UnknownSectorMode,
            Severity::Info,
            format!(
                "sector mode '{}' is not recognized; {} defaults applied",
                request.sector_mode,
                SectorMode::Civilian
            ),
        ));
    }

    let config = snapshot.sector_config(mode);

    if let Some(encryption) = request.encryption.filter(|e| *e < config.min_encryption) {
        findings.violation(Violation::new(
            EVALUATOR,
            ViolationCode::SectorEncryptionInsufficient,
            Severity::High,
            format!(
                "{} requires at least {:?} encryption, request attests {:?}",
                mode, config.min_encryption, encryption
            ),
        ));
    }

    if let Some(audit_level) = request.audit_level.filter(|a| *a < config.min_audit_level) {
        findings.violation(Violation::new(
            EVALUATOR,
            ViolationCode::SectorAuditInsufficient,
            Severity::High,
            format!(
                "{} requires at least {:?} audit level, request attests {:?}",
                mode, config.min_audit_level, audit_level
            ),
        ));
    }

    // No covering policy means nothing to certify against.
    if let Some(policy) = snapshot.matching_policy(&request.source_country, &request.data_types) {
        for framework in &config.required_frameworks {
            if !policy.certifies(framework) {
                findings.violation(Violation::new(
                    EVALUATOR,
                    ViolationCode::FrameworkNotCertified,
                    Severity::Low,
                    format!(
                        "{} requires framework '{}' which policy '{}' does not certify",
                        mode, framework, policy.id
                    ),
                ));
            }
        }
    }

    if config.security_level.requires_sign_off() {
        findings.sign_off_required = true;
        findings.condition(
            EVALUATOR,
            ConditionKind::AuthoritySignOff,
            format!(
                "{} operations at {:?} security level require authority sign-off",
                mode, config.security_level
            ),
        );
    }

    tracing::debug!(
        sector = %mode,
        violations = findings.violations.len(),
        sign_off = findings.sign_off_required,
        "sector evaluation complete"
    );
    findings
}
