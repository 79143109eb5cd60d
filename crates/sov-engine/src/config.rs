// config.rs — Engine configuration.
//
// Loaded from `engine.toml`. Every field has a default so an empty or
// missing file yields a working in-project layout under `.sov/`.
//
// ```toml
// audit_log = ".sov/audit.jsonl"
// stats_cache_ttl_ms = 1000
// retained_snapshots = 64
// max_deferred = 10000
//
// [retry]
// max_attempts = 4
// base_delay_ms = 25
// max_delay_ms = 400
//
// [review]
// tenants = ["ministry-of-interior"]
// operations = ["cross_border"]
// ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sov_policy::{Operation, DEFAULT_RETAINED_SNAPSHOTS};

use crate::error::EngineError;
use crate::retry::RetryPolicy;

/// Tenants and operations that always need a human decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    pub tenants: Vec<String>,
    pub operations: Vec<Operation>,
}

impl ReviewConfig {
    pub fn requires_review(&self, tenant_id: &str, operation: Operation) -> bool {
        self.tenants.iter().any(|t| t == tenant_id) || self.operations.contains(&operation)
    }
}

/// Configuration for the compliance engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the append-only audit log.
    pub audit_log: PathBuf,
    /// How long a computed stats snapshot may be served before rebuilding.
    pub stats_cache_ttl_ms: u64,
    /// How many published policy snapshots to keep for replay.
    pub retained_snapshots: usize,
    /// Cap on audit records waiting for replay. Checks are refused once
    /// it is reached.
    pub max_deferred: usize,
    pub retry: RetryPolicy,
    pub review: ReviewConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_log: PathBuf::from(".sov").join("audit.jsonl"),
            stats_cache_ttl_ms: 1000,
            retained_snapshots: DEFAULT_RETAINED_SNAPSHOTS,
            max_deferred: 10_000,
            retry: RetryPolicy::default(),
            review: ReviewConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a config with the standard `.sov/` layout under a project root.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        Self {
            audit_log: project_root.as_ref().join(".sov").join("audit.jsonl"),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from file if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, EngineError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no engine config found, using defaults");
            Ok(Self::default())
        }
    }
}
