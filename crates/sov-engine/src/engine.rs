// engine.rs — ComplianceEngine: the facade over evaluation, audit and approval.
//
// Control flow for a check:
//
//   validate → snapshot → evaluate → audit append (with retry) → return
//
// If the audit append exhausts its retries the check is still returned, with
// `audit_pending` set, and its record is queued for `reconcile()` to replay.
// The verdict never depends on the audit write succeeding.
//
// Approvals go through `approval_lock`, the one exclusive-write path: the
// pending → terminal transition is checked and appended while it is held,
// so two approvers can never both resolve the same check.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sov_audit::{
    find_check, query, ApprovalDecision, AuditError, AuditLog, AuditRecord, AuditSink, CheckFilter,
    ComplianceCheck, ComplianceStats, Page, Resolution,
};
use sov_policy::{
    ComplianceResult, DataResidencyPolicy, GeoRestriction, PolicyError, PolicySet, PolicySnapshot,
    PolicyStore, SectorModeConfig,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::request::CheckRequest;

/// Result of re-evaluating a recorded check against the snapshot it used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ReplayOutcome {
    /// Re-evaluation produced the recorded result exactly.
    Reproduced { policy_version: u64 },
    /// Re-evaluation produced a different result.
    Diverged {
        policy_version: u64,
        recorded: ComplianceResult,
        replayed: ComplianceResult,
    },
    /// The snapshot is no longer retained (or was published by an earlier process).
    SnapshotUnavailable { policy_version: u64 },
}

/// Point-in-time liveness summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    pub policy_version: u64,
    pub policy_digest: String,
    pub audit_entries: usize,
    pub audit_pending: usize,
}

struct CachedStats {
    stats: ComplianceStats,
    audit_entries: usize,
    policy_version: u64,
    computed: Instant,
}

/// The compliance service: one policy store, one audit sink.
///
/// The engine is `Send + Sync` and meant to be shared behind an `Arc`.
/// Every method takes `&self`; interior mutability comes from the
/// `Mutex` fields below and from the lock-free `ArcSwap` inside
/// `PolicyStore`. In Rust, a `Mutex<T>` owns the data it guards, so the
/// deferred queue cannot be touched without holding its lock.
pub struct ComplianceEngine {
    config: EngineConfig,
    policies: PolicyStore,
    /// `dyn AuditSink` lets tests swap the JSONL file for an in-memory
    /// or failing sink.
    audit: Arc<dyn AuditSink>,
    /// Records whose audit append failed, oldest first. Bounded by
    /// `EngineConfig::max_deferred`.
    deferred: Mutex<Vec<AuditRecord>>,
    /// Held for the whole read-check-append sequence of an approval.
    approval_lock: Mutex<()>,
    stats_cache: Mutex<Option<CachedStats>>,
}

impl ComplianceEngine {
    /// Create an engine over an arbitrary audit sink.
    pub fn new(
        config: EngineConfig,
        set: PolicySet,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, EngineError> {
        let policies = PolicyStore::with_retention(set, config.retained_snapshots)?;
        Ok(Self {
            config,
            policies,
            audit,
            deferred: Mutex::new(Vec::new()),
            approval_lock: Mutex::new(()),
            stats_cache: Mutex::new(None),
        })
    }

    /// Create an engine writing to the JSONL audit log named in `config`.
    pub fn open(config: EngineConfig, set: PolicySet) -> Result<Self, EngineError> {
        let log = AuditLog::open(&config.audit_log)?;
        Self::new(config, set, Arc::new(log))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Evaluation ───────────────────────────────────────────────

    /// Evaluate a request and record it.
    ///
    /// Returns `InvalidRequest` before evaluation when required fields are
    /// missing; nothing is recorded in that case.
    pub fn check(&self, request: CheckRequest) -> Result<ComplianceCheck, EngineError> {
        // Reject malformed input before anything is evaluated or written.
        let (tenant_id, request) = request.validate(&self.config.review)?;

        // Pin one snapshot for the whole evaluation. A publish that lands
        // while we evaluate only affects later checks.
        let snapshot = self.policies.snapshot();
        let result = sov_policy::evaluate(&snapshot, &request);
        let mut check = ComplianceCheck::new(tenant_id, request, &snapshot, result);

        // The closure is `FnMut` and may run several times, so each attempt
        // appends its own clone of the record.
        let record = AuditRecord::Check(check.clone());
        if let Err(e) = self
            .config
            .retry
            .run("audit append", || self.audit.append(record.clone()))
        {
            tracing::error!(
                check_id = %check.check_id,
                error = %e,
                "audit write deferred after retries exhausted"
            );
            check.audit_pending = true;
            self.defer(AuditRecord::Check(check.clone()))?;
        }

        tracing::info!(
            check_id = %check.check_id,
            tenant_id = %check.tenant_id,
            operation = %check.request.operation,
            sector_mode = %check.sector_mode,
            verdict = %check.result.verdict,
            policy_version = check.policy_version,
            "compliance check recorded"
        );
        Ok(check)
    }

    // ── Read-only configuration ──────────────────────────────────

    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.policies.snapshot()
    }

    pub fn policies(&self) -> Vec<DataResidencyPolicy> {
        self.policies.snapshot().policies().to_vec()
    }

    pub fn geo_restrictions(&self) -> Vec<GeoRestriction> {
        self.policies.snapshot().geo_restrictions().to_vec()
    }

    pub fn sector_modes(&self) -> Vec<SectorModeConfig> {
        self.policies.snapshot().sector_modes().to_vec()
    }

    // ── Audit history ────────────────────────────────────────────

    /// Filtered audit history, newest first.
    ///
    /// Checks still waiting in the replay queue appear once `reconcile()`
    /// has written them.
    pub fn checks(&self, filter: &CheckFilter, page: Page) -> Result<Vec<ComplianceCheck>, EngineError> {
        let entries = self.audit.entries()?;
        Ok(query(&entries, filter, page))
    }

    pub fn check_by_id(&self, check_id: Uuid) -> Result<ComplianceCheck, EngineError> {
        let entries = self.audit.entries()?;
        find_check(&entries, check_id).ok_or(EngineError::CheckNotFound(check_id))
    }

    /// Aggregate counters, rebuilt from the audit log.
    ///
    /// A cached copy is served while the log and policy version are unchanged
    /// and the cache is younger than `stats_cache_ttl_ms`.
    pub fn stats(&self) -> Result<ComplianceStats, EngineError> {
        let snapshot = self.policies.snapshot();
        let audit_entries = self.audit.len()?;
        let ttl = Duration::from_millis(self.config.stats_cache_ttl_ms);

        let mut cache = self
            .stats_cache
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        if let Some(cached) = cache.as_ref() {
            if cached.audit_entries == audit_entries
                && cached.policy_version == snapshot.version
                && cached.computed.elapsed() < ttl
            {
                return Ok(cached.stats.clone());
            }
        }

        let entries = self.audit.entries()?;
        let stats = ComplianceStats::from_entries(&entries, snapshot.active_policy_count());
        *cache = Some(CachedStats {
            stats: stats.clone(),
            audit_entries: entries.len(),
            policy_version: snapshot.version,
            computed: Instant::now(),
        });
        Ok(stats)
    }

    // ── Approval workflow ────────────────────────────────────────

    /// Resolve a pending check to allowed or denied.
    ///
    /// Fails with `AlreadyResolved` when the check is not pending, leaving
    /// the log untouched.
    pub fn approve(
        &self,
        check_id: Uuid,
        decision: ApprovalDecision,
        approver: &str,
        note: Option<String>,
    ) -> Result<ComplianceCheck, EngineError> {
        if approver.trim().is_empty() {
            return Err(EngineError::InvalidRequest("approver is required".to_string()));
        }

        // `_guard` keeps the lock until the end of the function. Binding it
        // to plain `_` would drop it immediately.
        let _guard = self
            .approval_lock
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;

        // A pending check may still be sitting in the replay queue; give it
        // a chance to reach the log first.
        if let Err(e) = self.reconcile() {
            tracing::warn!(error = %e, "reconcile before approval failed");
        }

        let entries = self.audit.entries()?;
        let Some(mut check) = find_check(&entries, check_id) else {
            if self.is_deferred(check_id)? {
                return Err(EngineError::Audit(AuditError::Unavailable(format!(
                    "check {} is awaiting audit replay",
                    check_id
                ))));
            }
            return Err(EngineError::CheckNotFound(check_id));
        };

        if check.result.verdict.is_terminal() {
            return Err(EngineError::AlreadyResolved {
                check_id,
                verdict: check.result.verdict,
            });
        }

        let mut resolution = Resolution::new(check_id, decision, approver.trim());
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            resolution = resolution.with_note(note);
        }
        let record = AuditRecord::Resolution(resolution.clone());
        self.config
            .retry
            .run("audit append", || self.audit.append(record.clone()))?;

        check.result.verdict = decision.verdict();
        check.resolution = Some(resolution);

        tracing::info!(
            check_id = %check_id,
            approver = %approver.trim(),
            verdict = %check.result.verdict,
            "pending check resolved"
        );
        Ok(check)
    }

    // ── Audit reconciliation ─────────────────────────────────────

    /// Replay deferred audit records in order.
    ///
    /// Stops at the first failure and keeps it and everything after it
    /// queued. Returns how many records were written.
    pub fn reconcile(&self) -> Result<usize, EngineError> {
        let mut deferred = self
            .deferred
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        if deferred.is_empty() {
            return Ok(0);
        }

        // Replay strictly in order so the hash chain reflects the order the
        // checks were made in. Records are only removed once written.
        let mut written = 0;
        let mut failure = None;
        for record in deferred.iter() {
            let mut record = record.clone();
            if let AuditRecord::Check(check) = &mut record {
                check.audit_pending = false;
            }
            match self.audit.append(record) {
                Ok(_) => written += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        deferred.drain(..written);

        match failure {
            Some(e) => {
                tracing::warn!(
                    replayed = written,
                    remaining = deferred.len(),
                    error = %e,
                    "audit reconcile incomplete"
                );
                Err(e.into())
            }
            None => {
                tracing::info!(replayed = written, "audit reconcile complete");
                Ok(written)
            }
        }
    }

    /// Number of checks returned to callers but not yet in the audit log.
    pub fn pending_audit_count(&self) -> Result<usize, EngineError> {
        let deferred = self
            .deferred
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        Ok(deferred.len())
    }

    /// Queue a record for `reconcile()`.
    ///
    /// Refuses with `AuditBacklogFull` once `max_deferred` records are
    /// waiting, and warns while the queue is more than half full.
    fn defer(&self, record: AuditRecord) -> Result<(), EngineError> {
        let mut deferred = self
            .deferred
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        let limit = self.config.max_deferred.max(1);
        if deferred.len() >= limit {
            tracing::error!(
                check_id = %record.check_id(),
                limit,
                "audit replay queue full, refusing check"
            );
            return Err(EngineError::AuditBacklogFull { limit });
        }
        deferred.push(record);
        if deferred.len() > limit / 2 {
            tracing::warn!(
                pending = deferred.len(),
                limit,
                "audit replay queue more than half full"
            );
        }
        Ok(())
    }

    fn is_deferred(&self, check_id: Uuid) -> Result<bool, EngineError> {
        let deferred = self
            .deferred
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        Ok(deferred.iter().any(|r| r.check_id() == check_id))
    }

    // ── Replay verification ──────────────────────────────────────

    /// Re-evaluate a recorded check against the snapshot it was evaluated on.
    ///
    /// Compares against the originally recorded result, not a later approval.
    pub fn verify_check(&self, check_id: Uuid) -> Result<ReplayOutcome, EngineError> {
        let entries = self.audit.entries()?;
        let recorded = entries
            .into_iter()
            .find_map(|entry| match entry.record {
                AuditRecord::Check(check) if check.check_id == check_id => Some(check),
                _ => None,
            })
            .ok_or(EngineError::CheckNotFound(check_id))?;

        // Versions restart at 1 in every process, so a version number alone
        // could name a different rule set. The digest must match too.
        let policy_version = recorded.policy_version;
        let Some(snapshot) = self
            .policies
            .snapshot_at(policy_version)?
            .filter(|s| s.digest == recorded.policy_digest)
        else {
            return Ok(ReplayOutcome::SnapshotUnavailable { policy_version });
        };

        let replayed = sov_policy::evaluate(&snapshot, &recorded.request);
        if replayed == recorded.result {
            Ok(ReplayOutcome::Reproduced { policy_version })
        } else {
            tracing::warn!(
                check_id = %check_id,
                policy_version,
                "replayed check diverged from recorded result"
            );
            Ok(ReplayOutcome::Diverged {
                policy_version,
                recorded: recorded.result,
                replayed,
            })
        }
    }

    // ── Administrative writes ────────────────────────────────────

    /// Replace the whole policy set.
    pub fn publish(&self, set: PolicySet) -> Result<Arc<PolicySnapshot>, EngineError> {
        Ok(self.policies.publish(set)?)
    }

    /// Re-read the policy YAML and publish it.
    pub fn reload_policies(&self, path: &Path) -> Result<Arc<PolicySnapshot>, EngineError> {
        let set = PolicySet::from_yaml_file(path)?;
        tracing::info!(path = %path.display(), "reloading policies");
        self.publish(set)
    }

    /// Insert a residency policy, replacing any with the same ID.
    pub fn upsert_policy(&self, policy: DataResidencyPolicy) -> Result<Arc<PolicySnapshot>, EngineError> {
        Ok(self.policies.modify(|set| {
            match set.policies.iter_mut().find(|p| p.id == policy.id) {
                Some(existing) => *existing = policy,
                None => set.policies.push(policy),
            }
            Ok(())
        })?)
    }

    pub fn remove_policy(&self, policy_id: &str) -> Result<Arc<PolicySnapshot>, EngineError> {
        Ok(self.policies.modify(|set| {
            let before = set.policies.len();
            set.policies.retain(|p| p.id != policy_id);
            if set.policies.len() == before {
                return Err(PolicyError::InvalidRecord {
                    kind: "policy",
                    id: policy_id.to_string(),
                    reason: "no such policy".to_string(),
                });
            }
            Ok(())
        })?)
    }

    /// Insert a geo restriction, replacing any with the same ID.
    pub fn upsert_restriction(
        &self,
        restriction: GeoRestriction,
    ) -> Result<Arc<PolicySnapshot>, EngineError> {
        Ok(self.policies.modify(|set| {
            match set
                .geo_restrictions
                .iter_mut()
                .find(|r| r.id == restriction.id)
            {
                Some(existing) => *existing = restriction,
                None => set.geo_restrictions.push(restriction),
            }
            Ok(())
        })?)
    }

    /// Set the posture for one sector mode.
    pub fn set_sector_config(
        &self,
        config: SectorModeConfig,
    ) -> Result<Arc<PolicySnapshot>, EngineError> {
        Ok(self.policies.modify(|set| {
            match set.sector_modes.iter_mut().find(|c| c.mode == config.mode) {
                Some(existing) => *existing = config,
                None => set.sector_modes.push(config),
            }
            Ok(())
        })?)
    }

    // ── Health ───────────────────────────────────────────────────

    pub fn health(&self) -> Result<EngineHealth, EngineError> {
        let snapshot = self.policies.snapshot();
        Ok(EngineHealth {
            policy_version: snapshot.version,
            policy_digest: snapshot.digest.clone(),
            audit_entries: self.audit.len()?,
            audit_pending: self.pending_audit_count()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sov_audit::MemoryAuditLog;
    use sov_policy::{Operation, RestrictionLevel, SectorMode, Verdict};

    fn engine_with(set: PolicySet) -> ComplianceEngine {
        ComplianceEngine::new(
            EngineConfig::default(),
            set,
            Arc::new(MemoryAuditLog::new()),
        )
        .unwrap()
    }

    fn request(operation: Operation, sector: &str) -> CheckRequest {
        CheckRequest {
            tenant_id: Some("tenant-1".to_string()),
            operation: Some(operation),
            source_country: Some("SA".to_string()),
            target_country: None,
            sector_mode: Some(sector.to_string()),
            data_types: vec!["personal".to_string()],
            encryption: None,
            audit_level: None,
        }
    }

    #[test]
    fn invalid_request_records_nothing() {
        let engine = engine_with(PolicySet::default());
        let mut req = request(Operation::DataProcessing, "civilian");
        req.data_types.clear();
        assert!(matches!(
            engine.check(req),
            Err(EngineError::InvalidRequest(_))
        ));
        assert_eq!(engine.health().unwrap().audit_entries, 0);
    }

    #[test]
    fn check_is_recorded_with_snapshot_version() {
        let engine = engine_with(PolicySet::default());
        let check = engine
            .check(request(Operation::DataProcessing, "civilian"))
            .unwrap();
        assert_eq!(check.policy_version, 1);
        assert!(!check.audit_pending);
        let stored = engine.check_by_id(check.check_id).unwrap();
        assert_eq!(stored.result, check.result);
    }

    #[test]
    fn review_flag_forces_pending() {
        let mut config = EngineConfig::default();
        config.review.operations = vec![Operation::DataProcessing];
        let engine =
            ComplianceEngine::new(config, PolicySet::default(), Arc::new(MemoryAuditLog::new()))
                .unwrap();
        let check = engine
            .check(request(Operation::DataProcessing, "civilian"))
            .unwrap();
        assert_eq!(check.result.verdict, Verdict::PendingApproval);
        assert!(check.request.review_required);
    }

    #[test]
    fn approve_unknown_check_is_not_found() {
        let engine = engine_with(PolicySet::default());
        let id = Uuid::new_v4();
        assert!(matches!(
            engine.approve(id, ApprovalDecision::Allow, "officer", None),
            Err(EngineError::CheckNotFound(found)) if found == id
        ));
    }

    #[test]
    fn approve_requires_approver() {
        let engine = engine_with(PolicySet::default());
        assert!(matches!(
            engine.approve(Uuid::new_v4(), ApprovalDecision::Allow, " ", None),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn conflicting_restriction_is_rejected_and_store_unchanged() {
        let engine = engine_with(PolicySet::default());
        let restriction = |id: &str| GeoRestriction {
            id: id.to_string(),
            country: "IR".to_string(),
            restriction_level: RestrictionLevel::Prohibited,
            sector_modes: vec![SectorMode::Military],
            active: true,
        };
        engine.upsert_restriction(restriction("r1")).unwrap();
        let version = engine.snapshot().version;
        assert!(matches!(
            engine.upsert_restriction(restriction("r2")),
            Err(EngineError::Configuration(PolicyError::ConflictingRestriction { .. }))
        ));
        assert_eq!(engine.snapshot().version, version);
        assert_eq!(engine.geo_restrictions().len(), 1);
    }

    #[test]
    fn upsert_replaces_by_id_and_remove_unknown_fails() {
        let engine = engine_with(PolicySet::default());
        let mut policy = DataResidencyPolicy {
            id: "sa".to_string(),
            region: "SA".to_string(),
            allowed_countries: vec![],
            blocked_countries: vec![],
            data_types: vec![],
            encryption_required: false,
            local_storage_only: false,
            cross_border_transfer_allowed: true,
            frameworks: vec![],
            enabled: true,
        };
        engine.upsert_policy(policy.clone()).unwrap();
        policy.encryption_required = true;
        engine.upsert_policy(policy).unwrap();
        let policies = engine.policies();
        assert_eq!(policies.len(), 1);
        assert!(policies[0].encryption_required);

        assert!(engine.remove_policy("missing").is_err());
        engine.remove_policy("sa").unwrap();
        assert!(engine.policies().is_empty());
    }

    #[test]
    fn stats_cache_refreshes_after_new_check() {
        let engine = engine_with(PolicySet::default());
        assert_eq!(engine.stats().unwrap().total_checks, 0);
        engine
            .check(request(Operation::DataProcessing, "civilian"))
            .unwrap();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_checks, 1);
        assert!(stats.is_consistent());
    }

    #[test]
    fn verify_check_reproduces_result() {
        let engine = engine_with(PolicySet::default());
        let check = engine
            .check(request(Operation::DataStorage, "military"))
            .unwrap();
        assert_eq!(
            engine.verify_check(check.check_id).unwrap(),
            ReplayOutcome::Reproduced { policy_version: 1 }
        );
    }

    #[test]
    fn verify_check_survives_later_publish() {
        let engine = engine_with(PolicySet::default());
        let check = engine
            .check(request(Operation::DataStorage, "civilian"))
            .unwrap();
        engine.publish(PolicySet::default()).unwrap();
        assert_eq!(engine.snapshot().version, 2);
        assert_eq!(
            engine.verify_check(check.check_id).unwrap(),
            ReplayOutcome::Reproduced { policy_version: 1 }
        );
    }

    /// Sink that rejects every append.
    struct DownSink;

    impl AuditSink for DownSink {
        fn append(&self, _record: AuditRecord) -> Result<sov_audit::AuditEntry, AuditError> {
            Err(AuditError::Unavailable("offline".to_string()))
        }

        fn entries(&self) -> Result<Vec<sov_audit::AuditEntry>, AuditError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn full_replay_queue_refuses_checks() {
        let config = EngineConfig {
            max_deferred: 2,
            retry: crate::RetryPolicy::none(),
            ..EngineConfig::default()
        };
        let engine = ComplianceEngine::new(config, PolicySet::default(), Arc::new(DownSink)).unwrap();

        for _ in 0..2 {
            let check = engine
                .check(request(Operation::DataProcessing, "civilian"))
                .unwrap();
            assert!(check.audit_pending);
        }
        assert!(matches!(
            engine.check(request(Operation::DataProcessing, "civilian")),
            Err(EngineError::AuditBacklogFull { limit: 2 })
        ));
        assert_eq!(engine.pending_audit_count().unwrap(), 2);
        assert_eq!(engine.health().unwrap().audit_pending, 2);
    }

    #[test]
    fn verify_unknown_check_is_not_found() {
        let engine = engine_with(PolicySet::default());
        assert!(matches!(
            engine.verify_check(Uuid::new_v4()),
            Err(EngineError::CheckNotFound(_))
        ));
    }
}
