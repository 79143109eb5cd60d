// request.rs — The proposed data operation submitted for evaluation.

use serde::{Deserialize, Serialize};

use crate::model::{same_code, AuditLevel, EncryptionStandard, Operation, SectorMode};

/// A proposed data operation, as seen by the evaluators.
///
/// The sector mode is kept as the caller supplied it so that an unknown
/// mode can be reported in the result rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub operation: Operation,
    pub source_country: String,
    #[serde(default)]
    pub target_country: Option<String>,
    pub sector_mode: String,
    pub data_types: Vec<String>,
    /// Encryption the caller attests to. Absent is no claim.
    #[serde(default)]
    pub encryption: Option<EncryptionStandard>,
    /// Audit level the caller attests to. Absent is no claim.
    #[serde(default)]
    pub audit_level: Option<AuditLevel>,
    /// The tenant or operation is flagged for human review.
    #[serde(default)]
    pub review_required: bool,
}

impl EvaluationRequest {
    /// Target country, treating an empty string as absent.
    pub fn target(&self) -> Option<&str> {
        self.target_country
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// The target is set and differs from the source.
    pub fn leaves_source(&self) -> bool {
        self.target()
            .is_some_and(|target| !same_code(target, &self.source_country))
    }

    /// The operation moves data across a border, explicitly or by target.
    pub fn crosses_border(&self) -> bool {
        self.operation == Operation::CrossBorder || self.leaves_source()
    }

    /// Resolved sector mode and whether the input was recognized.
    pub fn sector(&self) -> (SectorMode, bool) {
        SectorMode::resolve(&self.sector_mode)
    }

    /// Whether the caller attests any encryption at all.
    ///
    /// A residency policy that mandates encryption needs a positive claim;
    /// sector minimums only judge claims that were actually made.
    pub fn attests_encryption(&self) -> bool {
        self.encryption
            .is_some_and(|standard| standard != EncryptionStandard::None)
    }
}
