//! # sov-engine
//!
//! The compliance service facade: request validation, evaluation against
//! the current policy snapshot, audit recording with bounded retry, the
//! approval workflow, stats and replay verification.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use sov_engine::{CheckRequest, ComplianceEngine, EngineConfig};
//! use sov_policy::{Operation, PolicySet};
//!
//! let engine = ComplianceEngine::open(EngineConfig::for_project("."), PolicySet::default()).unwrap();
//! let check = engine
//!     .check(CheckRequest {
//!         tenant_id: Some("tenant-1".into()),
//!         operation: Some(Operation::CrossBorder),
//!         source_country: Some("SA".into()),
//!         target_country: Some("US".into()),
//!         sector_mode: Some("civilian".into()),
//!         data_types: vec!["personal".into()],
//!         ..CheckRequest::default()
//!     })
//!     .unwrap();
//! println!("{}: {}", check.check_id, check.result.verdict);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod request;
pub mod retry;

pub use config::{EngineConfig, ReviewConfig};
pub use engine::{ComplianceEngine, EngineHealth, ReplayOutcome};
pub use error::EngineError;
pub use request::CheckRequest;
pub use retry::RetryPolicy;
