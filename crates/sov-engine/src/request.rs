// request.rs — Caller-facing check request and its validation.
//
// Fields arrive optional so that a malformed request is reported as
// `InvalidRequest` rather than a deserialization failure. Validation runs
// before evaluation; a rejected request leaves no audit record.

use serde::{Deserialize, Serialize};

use sov_policy::{AuditLevel, EncryptionStandard, EvaluationRequest, Operation};

use crate::config::ReviewConfig;
use crate::error::EngineError;

/// A request to evaluate one proposed data operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub tenant_id: Option<String>,
    pub operation: Option<Operation>,
    pub source_country: Option<String>,
    #[serde(default)]
    pub target_country: Option<String>,
    pub sector_mode: Option<String>,
    #[serde(default)]
    pub data_types: Vec<String>,
    #[serde(default)]
    pub encryption: Option<EncryptionStandard>,
    #[serde(default)]
    pub audit_level: Option<AuditLevel>,
}

impl CheckRequest {
    /// Validate and convert into the tenant ID and evaluator input.
    pub fn validate(self, review: &ReviewConfig) -> Result<(String, EvaluationRequest), EngineError> {
        let tenant_id = required(self.tenant_id, "tenantId")?;
        let operation = self
            .operation
            .ok_or_else(|| EngineError::InvalidRequest("operation is required".to_string()))?;
        let source_country = country_code(required(self.source_country, "sourceCountry")?, "sourceCountry")?;
        let target_country = match self.target_country {
            Some(target) if !target.trim().is_empty() => {
                Some(country_code(target, "targetCountry")?)
            }
            _ => None,
        };
        let sector_mode = required(self.sector_mode, "sectorMode")?;

        if self.data_types.is_empty() {
            return Err(EngineError::InvalidRequest(
                "dataTypes must list at least one data type".to_string(),
            ));
        }
        let mut data_types = Vec::with_capacity(self.data_types.len());
        for data_type in self.data_types {
            let trimmed = data_type.trim();
            if trimmed.is_empty() {
                return Err(EngineError::InvalidRequest(
                    "dataTypes must not contain empty entries".to_string(),
                ));
            }
            data_types.push(trimmed.to_string());
        }

        let review_required = review.requires_review(&tenant_id, operation);
        Ok((
            tenant_id,
            EvaluationRequest {
                operation,
                source_country,
                target_country,
                sector_mode,
                data_types,
                encryption: self.encryption,
                audit_level: self.audit_level,
                review_required,
            },
        ))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(EngineError::InvalidRequest(format!("{} is required", field))),
    }
}

/// Country and region codes: letters, digits and hyphens, stored uppercase.
fn country_code(value: String, field: &str) -> Result<String, EngineError> {
    let code = value.trim().to_ascii_uppercase();
    if code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(code)
    } else {
        Err(EngineError::InvalidRequest(format!(
            "{} '{}' is not a valid country code",
            field, value
        )))
    }
}
