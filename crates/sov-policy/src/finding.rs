// finding.rs — Violations and conditions raised by the rule evaluators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a violation is, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Self::Info,
            Self::Low,
            Self::Medium,
            Self::High,
            Self::Critical,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Stable, machine-checkable violation codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    CrossBorderDenied,
    LocalStorageOnly,
    EncryptionRequired,
    NoPolicyDefined,
    TargetCountryBlocked,
    TargetNotAllowlisted,
    GeoProhibited,
    GeoRestricted,
    SectorEncryptionInsufficient,
    SectorAuditInsufficient,
    FrameworkNotCertified,
    UnknownSectorMode,
}

/// Which evaluator raised a finding. Order doubles as the tie-breaker
/// when sorting violations of equal severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Evaluator {
    Residency,
    Geographic,
    Sector,
}

/// A specific rule failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub code: ViolationCode,
    pub severity: Severity,
    pub message: String,
    pub evaluator: Evaluator,
}

impl Violation {
    pub fn new(
        evaluator: Evaluator,
        code: ViolationCode,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            evaluator,
        }
    }
}

/// What kind of human action a condition asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// A restricted country requires manual approval of the operation.
    ManualApproval,
    /// The sector requires authority sign-off before anything proceeds.
    AuthoritySignOff,
}

/// A non-blocking requirement attached to the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub kind: ConditionKind,
    pub requirement: String,
    pub evaluator: Evaluator,
}

/// Everything one evaluator found for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    pub violations: Vec<Violation>,
    pub conditions: Vec<Condition>,
    /// Set by the sector evaluator when the sector never auto-allows.
    pub sign_off_required: bool,
}

impl Findings {
    pub fn violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn condition(
        &mut self,
        evaluator: Evaluator,
        kind: ConditionKind,
        requirement: impl Into<String>,
    ) {
        self.conditions.push(Condition {
            kind,
            requirement: requirement.into(),
            evaluator,
        });
    }

    /// Append another evaluator's findings after this one's.
    pub fn extend(&mut self, other: Findings) {
        self.violations.extend(other.violations);
        self.conditions.extend(other.conditions);
        self.sign_off_required |= other.sign_off_required;
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.conditions.is_empty() && !self.sign_off_required
    }
}
