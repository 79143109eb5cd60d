// store.rs — Versioned, copy-on-write policy store.
//
// Readers load the current `PolicySnapshot` through an `ArcSwap` and never
// block. Administrators publish a whole new `PolicySet`; it is validated,
// stamped with the next version and a SHA-256 digest, then swapped in
// atomically. A half-applied edit is never visible.
//
// Published snapshots are retained by version so a past check can be
// re-evaluated against exactly the rules it saw.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PolicyError;
use crate::model::{
    same_code, DataResidencyPolicy, GeoRestriction, PolicySet, SectorMode, SectorModeConfig,
};

/// An immutable, versioned view of the policy data.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshot {
    pub version: u64,
    /// SHA-256 of the canonical JSON encoding of `set`.
    pub digest: String,
    pub published_at: DateTime<Utc>,
    set: PolicySet,
}

impl PolicySnapshot {
    fn new(version: u64, set: PolicySet) -> Self {
        let digest = digest_of(&set);
        Self {
            version,
            digest,
            published_at: Utc::now(),
            set,
        }
    }

    pub fn set(&self) -> &PolicySet {
        &self.set
    }

    pub fn policies(&self) -> &[DataResidencyPolicy] {
        &self.set.policies
    }

    pub fn geo_restrictions(&self) -> &[GeoRestriction] {
        &self.set.geo_restrictions
    }

    pub fn sector_modes(&self) -> &[SectorModeConfig] {
        &self.set.sector_modes
    }

    pub fn active_policy_count(&self) -> usize {
        self.set.policies.iter().filter(|p| p.enabled).count()
    }

    /// The enabled policy for `source` that covers any of `data_types`.
    ///
    /// Validation guarantees at most one enabled policy per region.
    pub fn matching_policy(
        &self,
        source: &str,
        data_types: &[String],
    ) -> Option<&DataResidencyPolicy> {
        self.set
            .policies
            .iter()
            .find(|p| p.covers(source, data_types))
    }

    /// Active restrictions on `country` that apply under `mode`.
    pub fn restrictions_for<'a>(
        &'a self,
        country: &'a str,
        mode: SectorMode,
    ) -> impl Iterator<Item = &'a GeoRestriction> + 'a {
        self.set.geo_restrictions.iter().filter(move |r| {
            r.active && same_code(&r.country, country) && r.applies_to(mode)
        })
    }

    /// The posture for `mode`. Unconfigured modes use the civilian config.
    pub fn sector_config(&self, mode: SectorMode) -> SectorModeConfig {
        let find = |m: SectorMode| self.set.sector_modes.iter().find(|c| c.mode == m);
        find(mode)
            .or_else(|| find(SectorMode::Civilian))
            .cloned()
            .unwrap_or_else(|| SectorModeConfig::builtin(SectorMode::Civilian))
    }
}

/// Single-writer, many-reader store of policy snapshots.
///
/// `ArcSwap` holds an `Arc<PolicySnapshot>` that can be replaced
/// atomically. A reader's `load_full()` bumps the reference count and
/// returns; the snapshot it got stays alive for as long as the reader
/// holds it, even after a writer has swapped in a newer one. Writers
/// serialize on the `history` mutex, which also owns the replay history.
pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
    history: Mutex<BTreeMap<u64, Arc<PolicySnapshot>>>,
    /// How many published snapshots to keep for replay.
    retain: usize,
}

/// Snapshots retained for replay when no explicit limit is configured.
pub const DEFAULT_RETAINED_SNAPSHOTS: usize = 64;

impl PolicyStore {
    /// Create a store holding `set` as version 1.
    pub fn new(set: PolicySet) -> Result<Self, PolicyError> {
        Self::with_retention(set, DEFAULT_RETAINED_SNAPSHOTS)
    }

    pub fn with_retention(set: PolicySet, retain: usize) -> Result<Self, PolicyError> {
        set.validate()?;
        let snapshot = Arc::new(PolicySnapshot::new(1, set));
        let mut history = BTreeMap::new();
        history.insert(1, snapshot.clone());
        Ok(Self {
            current: ArcSwap::new(snapshot),
            history: Mutex::new(history),
            retain: retain.max(1),
        })
    }

    /// The current snapshot (lock-free).
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// A previously published snapshot, if still retained.
    ///
    /// `Ok(None)` means the version was trimmed or never published.
    pub fn snapshot_at(&self, version: u64) -> Result<Option<Arc<PolicySnapshot>>, PolicyError> {
        let history = self
            .history
            .lock()
            .map_err(|e| PolicyError::LockPoisoned(e.to_string()))?;
        Ok(history.get(&version).cloned())
    }

    /// Validate and publish a new policy set.
    ///
    /// On error the current snapshot is left untouched.
    pub fn publish(&self, set: PolicySet) -> Result<Arc<PolicySnapshot>, PolicyError> {
        self.modify(|draft| {
            *draft = set;
            Ok(())
        })
    }

    /// Apply an edit to a copy of the current set and publish the result.
    ///
    /// The history lock serializes writers, so concurrent edits never lose
    /// each other's changes.
    pub fn modify<F>(&self, edit: F) -> Result<Arc<PolicySnapshot>, PolicyError>
    where
        F: FnOnce(&mut PolicySet) -> Result<(), PolicyError>,
    {
        let mut history = self
            .history
            .lock()
            .map_err(|e| PolicyError::LockPoisoned(e.to_string()))?;

        // Only writers take the lock, so `current` cannot change under us
        // between this load and the store below.
        let current = self.current.load_full();

        // Edit a deep copy. Readers keep seeing `current` until the swap,
        // and a failed edit or validation just drops the draft.
        let mut draft = current.set.clone();
        edit(&mut draft)?;
        draft.validate()?;

        let snapshot = Arc::new(PolicySnapshot::new(current.version + 1, draft));
        history.insert(snapshot.version, snapshot.clone());
        // `BTreeMap` keys are ordered, so `pop_first` drops the oldest.
        while history.len() > self.retain {
            history.pop_first();
        }
        // Publish last: from here on new readers get the new snapshot.
        self.current.store(snapshot.clone());

        tracing::info!(
            version = snapshot.version,
            digest = %snapshot.digest,
            policies = snapshot.policies().len(),
            restrictions = snapshot.geo_restrictions().len(),
            "published policy snapshot"
        );
        Ok(snapshot)
    }
}

fn digest_of(set: &PolicySet) -> String {
    // Serializing plain structs and Vecs cannot fail; an empty encoding
    // would still yield a stable digest.
    let json = serde_json::to_vec(set).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("{:x}", hasher.finalize())
}
