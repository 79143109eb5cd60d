// model.rs — Policy data model: residency policies, geo restrictions, sector configs.
//
// Codes, levels and modes are closed enums. Framework names and data types
// stay open string sets because jurisdictions keep adding new ones.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Operating context that sets the minimum security posture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum SectorMode {
    Civilian,
    Government,
    Military,
    Security,
    #[serde(alias = "critical_infrastructure")]
    CriticalInfrastructure,
}

impl SectorMode {
    /// All sector modes, in declaration order.
    pub fn all() -> &'static [SectorMode] {
        &[
            Self::Civilian,
            Self::Government,
            Self::Military,
            Self::Security,
            Self::CriticalInfrastructure,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Civilian => "civilian",
            Self::Government => "government",
            Self::Military => "military",
            Self::Security => "security",
            Self::CriticalInfrastructure => "critical-infrastructure",
        }
    }

    /// Parse a caller-supplied mode, falling back to civilian.
    ///
    /// Returns the resolved mode and whether the input was recognized.
    pub fn resolve(input: &str) -> (SectorMode, bool) {
        match input.parse() {
            Ok(mode) => (mode, true),
            Err(_) => (SectorMode::Civilian, false),
        }
    }
}

impl fmt::Display for SectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectorMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        SectorMode::all()
            .iter()
            .copied()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| PolicyError::UnknownSectorMode(s.to_string()))
    }
}

/// Security posture of a sector, ordered from least to most strict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityLevel {
    Standard,
    Elevated,
    High,
    Critical,
    #[serde(alias = "top_secret")]
    TopSecret,
}

impl SecurityLevel {
    /// Sectors at this level never auto-allow; a human must sign off.
    pub fn requires_sign_off(&self) -> bool {
        *self >= SecurityLevel::Critical
    }
}

/// Encryption standard, ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStandard {
    #[default]
    None,
    Aes128,
    Aes256,
    Aes256Hsm,
}

/// Audit detail level, ordered from least to most detailed.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    #[default]
    Basic,
    Standard,
    Detailed,
    Forensic,
}

/// The kind of data operation being proposed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    DataTransfer,
    DataStorage,
    DataProcessing,
    CrossBorder,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::DataTransfer => write!(f, "data_transfer"),
            Operation::DataStorage => write!(f, "data_storage"),
            Operation::DataProcessing => write!(f, "data_processing"),
            Operation::CrossBorder => write!(f, "cross_border"),
        }
    }
}

/// How strongly a country is restricted for a set of sector modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionLevel {
    None,
    Restricted,
    Prohibited,
}

fn default_true() -> bool {
    true
}

/// Region-scoped rules governing storage, processing and cross-border transfer.
///
/// ```yaml
/// id: sa-pdpl
/// region: SA
/// blockedCountries: [IR]
/// dataTypes: [personal, financial]
/// encryptionRequired: true
/// localStorageOnly: true
/// crossBorderTransferAllowed: false
/// frameworks: [PDPL, NCA-ECC]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataResidencyPolicy {
    pub id: String,
    /// Region code the policy governs; matched against the source country.
    pub region: String,
    /// Transfer destinations explicitly permitted. Empty means unrestricted.
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    /// Transfer destinations that are never permitted.
    #[serde(default)]
    pub blocked_countries: Vec<String>,
    /// Data types this policy covers. Empty means every data type.
    #[serde(default)]
    pub data_types: Vec<String>,
    #[serde(default)]
    pub encryption_required: bool,
    #[serde(default)]
    pub local_storage_only: bool,
    #[serde(default = "default_true")]
    pub cross_border_transfer_allowed: bool,
    /// Legal frameworks this policy certifies (open set).
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl DataResidencyPolicy {
    /// Whether this policy governs data leaving `source` with any of `data_types`.
    pub fn covers(&self, source: &str, data_types: &[String]) -> bool {
        self.enabled
            && same_code(&self.region, source)
            && (self.data_types.is_empty()
                || self
                    .data_types
                    .iter()
                    .any(|covered| data_types.iter().any(|dt| same_code(covered, dt))))
    }

    pub fn certifies(&self, framework: &str) -> bool {
        self.frameworks.iter().any(|f| same_code(f, framework))
    }
}

/// Per-country restriction that applies to a set of sector modes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeoRestriction {
    pub id: String,
    pub country: String,
    pub restriction_level: RestrictionLevel,
    /// Modes the restriction applies to. Empty means every mode.
    #[serde(default)]
    pub sector_modes: Vec<SectorMode>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl GeoRestriction {
    pub fn applies_to(&self, mode: SectorMode) -> bool {
        self.sector_modes.is_empty() || self.sector_modes.contains(&mode)
    }

    fn covered_modes(&self) -> Vec<SectorMode> {
        if self.sector_modes.is_empty() {
            SectorMode::all().to_vec()
        } else {
            self.sector_modes.clone()
        }
    }
}

/// Minimum security posture for one sector mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectorModeConfig {
    pub mode: SectorMode,
    pub security_level: SecurityLevel,
    pub min_encryption: EncryptionStandard,
    pub min_audit_level: AuditLevel,
    #[serde(default)]
    pub required_frameworks: Vec<String>,
}

impl SectorModeConfig {
    /// Built-in posture for a mode, used when no configuration is supplied.
    pub fn builtin(mode: SectorMode) -> Self {
        let (security_level, min_encryption, min_audit_level) = match mode {
            SectorMode::Civilian => (
                SecurityLevel::Standard,
                EncryptionStandard::None,
                AuditLevel::Basic,
            ),
            SectorMode::Government => (
                SecurityLevel::Elevated,
                EncryptionStandard::Aes128,
                AuditLevel::Standard,
            ),
            SectorMode::Military => (
                SecurityLevel::High,
                EncryptionStandard::Aes256,
                AuditLevel::Detailed,
            ),
            SectorMode::Security => (
                SecurityLevel::High,
                EncryptionStandard::Aes256,
                AuditLevel::Detailed,
            ),
            SectorMode::CriticalInfrastructure => (
                SecurityLevel::Critical,
                EncryptionStandard::Aes256Hsm,
                AuditLevel::Forensic,
            ),
        };
        Self {
            mode,
            security_level,
            min_encryption,
            min_audit_level,
            required_frameworks: Vec::new(),
        }
    }
}

/// The complete administrator-maintained policy data.
///
/// Loaded from YAML. When `sectorModes` is omitted the built-in postures
/// for all five modes are used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicySet {
    #[serde(default)]
    pub policies: Vec<DataResidencyPolicy>,
    #[serde(default)]
    pub geo_restrictions: Vec<GeoRestriction>,
    #[serde(default = "builtin_sector_modes")]
    pub sector_modes: Vec<SectorModeConfig>,
}

fn builtin_sector_modes() -> Vec<SectorModeConfig> {
    SectorMode::all()
        .iter()
        .map(|mode| SectorModeConfig::builtin(*mode))
        .collect()
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            policies: Vec::new(),
            geo_restrictions: Vec::new(),
            sector_modes: builtin_sector_modes(),
        }
    }
}

impl PolicySet {
    /// Parse and validate a policy set from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, PolicyError> {
        let set: PolicySet = serde_yaml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Load and validate a policy set from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Check the write-time invariants.
    ///
    /// - every record has a non-empty id and country/region
    /// - at most one enabled policy per region
    /// - at most one active restriction per (country, sector mode)
    /// - at most one config per sector mode
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut regions: HashMap<String, &str> = HashMap::new();
        for policy in &self.policies {
            require_field("policy", &policy.id, "id", &policy.id)?;
            require_field("policy", &policy.id, "region", &policy.region)?;
            if !policy.enabled {
                continue;
            }
            let key = policy.region.to_ascii_uppercase();
            if let Some(first) = regions.insert(key, &policy.id) {
                return Err(PolicyError::DuplicateRegion {
                    region: policy.region.clone(),
                    first: first.to_string(),
                    second: policy.id.clone(),
                });
            }
        }

        let mut pairs: HashMap<(String, SectorMode), &str> = HashMap::new();
        for restriction in &self.geo_restrictions {
            require_field("geo restriction", &restriction.id, "id", &restriction.id)?;
            require_field(
                "geo restriction",
                &restriction.id,
                "country",
                &restriction.country,
            )?;
            if !restriction.active {
                continue;
            }
            for mode in restriction.covered_modes() {
                let key = (restriction.country.to_ascii_uppercase(), mode);
                if let Some(first) = pairs.insert(key, &restriction.id) {
                    return Err(PolicyError::ConflictingRestriction {
                        country: restriction.country.clone(),
                        mode,
                        first: first.to_string(),
                        second: restriction.id.clone(),
                    });
                }
            }
        }

        let mut modes = Vec::new();
        for config in &self.sector_modes {
            if modes.contains(&config.mode) {
                return Err(PolicyError::DuplicateSectorMode(config.mode));
            }
            modes.push(config.mode);
        }

        Ok(())
    }
}

fn require_field(
    kind: &'static str,
    id: &str,
    field: &str,
    value: &str,
) -> Result<(), PolicyError> {
    if value.trim().is_empty() {
        return Err(PolicyError::InvalidRecord {
            kind,
            id: id.to_string(),
            reason: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

/// Country, region and data type codes compare case-insensitively.
pub fn same_code(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
