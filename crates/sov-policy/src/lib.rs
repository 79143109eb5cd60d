//! # sov-policy
//!
//! Residency, geographic and sector-mode policy evaluation for sovereign
//! compliance.
//!
//! A proposed data operation ([`EvaluationRequest`]) is checked against a
//! versioned [`PolicySnapshot`] by three independent evaluators, and their
//! findings are aggregated into a [`ComplianceResult`] with machine-checkable
//! [`ViolationCode`]s.
//!
//! ## Key invariants
//!
//! - **Deterministic**: same snapshot + same request → identical result,
//!   including violation order.
//! - **Critical is absolute**: any critical violation denies.
//! - **Sign-off sectors never auto-allow**: `critical` and `top-secret`
//!   sectors resolve to at least pending approval.
//! - **Absent data is no constraint**: a missing policy, restriction or
//!   sector config never fails evaluation.
//! - **Copy-on-write store**: readers never observe a partially published
//!   policy edit.

pub mod engine;
pub mod error;
pub mod finding;
pub mod geo;
pub mod model;
pub mod request;
pub mod residency;
pub mod sector;
pub mod store;
pub mod verdict;

pub use engine::evaluate;
pub use error::PolicyError;
pub use finding::{
    Condition, ConditionKind, Evaluator, Findings, Severity, Violation, ViolationCode,
};
pub use model::{
    AuditLevel, DataResidencyPolicy, EncryptionStandard, GeoRestriction, Operation, PolicySet,
    RestrictionLevel, SectorMode, SectorModeConfig, SecurityLevel,
};
pub use request::EvaluationRequest;
pub use store::{PolicySnapshot, PolicyStore, DEFAULT_RETAINED_SNAPSHOTS};
pub use verdict::{aggregate, ComplianceResult, Verdict};
