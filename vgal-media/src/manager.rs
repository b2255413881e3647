//! Resource manager
//!
//! Single owner of the visible/loaded/loading/playing sets, the capacity
//! limits and the cleanup throttle. Every mutation of the sets goes through
//! the methods here.
//!
//! Invariants kept at every observable point:
//! - `playing ⊆ loaded`
//! - `loading ∩ loaded = ∅` (load completion is an atomic move)
//! - `|loading| ≤ max_concurrent_loading` (admitted items without a free
//!   slot wait in the deferred queue). When the limits shrink under
//!   in-flight loads, the excess is allowed to finish; no load starts
//!   until it has drained.
//! - eviction never selects a visible or playing item
//!
//! `loaded` may exceed `max_loaded` until the next effective cleanup.

use crate::admission;
use crate::capacity::{CapacityLimits, CapacityMode, CapacityPolicy};
use crate::error::{Error, Result};
use crate::eviction::{self, CleanupPlan, CleanupThrottle, RankKey};
use crate::tracked::TrackedSets;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of asking for a loading slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Item moved into `loading`
    Started,
    /// Admitted but every slot is taken; queued until one frees
    Deferred,
    /// Not admitted (not visible and over capacity)
    Denied,
    /// Already loading or loaded
    AlreadyActive,
}

/// Snapshot for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStats {
    pub visible: usize,
    pub loaded: usize,
    pub loading: usize,
    pub playing: usize,
    pub deferred: usize,
    pub limits: CapacityLimits,
}

impl std::fmt::Display for ResourceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "visible={} loaded={}/{} loading={}/{} playing={} deferred={}",
            self.visible,
            self.loaded,
            self.limits.max_loaded,
            self.loading,
            self.limits.max_concurrent_loading,
            self.playing,
            self.deferred
        )
    }
}

pub struct ResourceManager {
    policy: CapacityPolicy,
    mode: CapacityMode,
    total_items: usize,
    limits: CapacityLimits,
    sets: TrackedSets,
    throttle: CleanupThrottle,

    /// Catalog order, used to rank eviction candidates by viewport distance
    positions: HashMap<Uuid, usize>,

    /// Last load/play/pause/visibility touch per item
    last_used: HashMap<Uuid, Instant>,

    /// Admitted items waiting for a loading slot, FIFO
    deferred: VecDeque<Uuid>,

    /// Loads allowed in flight: the slot limit, or more while loads started
    /// under a larger limit are still running
    loading_allowance: usize,
}

impl ResourceManager {
    pub fn new(policy: CapacityPolicy, mode: CapacityMode, throttle_interval: Duration) -> Self {
        let limits = policy.limits(0, mode);
        Self {
            policy,
            mode,
            total_items: 0,
            limits,
            sets: TrackedSets::default(),
            throttle: CleanupThrottle::new(throttle_interval),
            positions: HashMap::new(),
            last_used: HashMap::new(),
            deferred: VecDeque::new(),
            loading_allowance: limits.max_concurrent_loading,
        }
    }

    pub fn limits(&self) -> CapacityLimits {
        self.limits
    }

    pub fn mode(&self) -> CapacityMode {
        self.mode
    }

    pub fn sets(&self) -> &TrackedSets {
        &self.sets
    }

    /// Install catalog order; recomputes limits from the new size
    pub fn set_catalog_order<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = Uuid>,
    {
        self.positions = ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();
        self.total_items = self.positions.len();
        self.recompute_limits();
    }

    /// Catalog size without ordering information
    pub fn set_total_items(&mut self, total_items: usize) {
        self.total_items = total_items;
        self.recompute_limits();
    }

    pub fn set_mode(&mut self, mode: CapacityMode) {
        self.mode = mode;
        self.recompute_limits();
    }

    fn recompute_limits(&mut self) {
        let limits = self.policy.limits(self.total_items, self.mode);
        if limits != self.limits {
            info!(
                "Capacity limits for {} items ({}): max_loaded={} max_concurrent_loading={}",
                self.total_items, self.mode, limits.max_loaded, limits.max_concurrent_loading
            );
        }
        self.limits = limits;
        self.loading_allowance = self.sets.loading.len().max(limits.max_concurrent_loading);
        if self.loading_allowance > limits.max_concurrent_loading {
            debug!(
                "{} loads in flight above the new limit of {}",
                self.loading_allowance, limits.max_concurrent_loading
            );
        }
    }

    /// Shrink the allowance as in-flight loads leave `loading`
    fn settle_allowance(&mut self) {
        self.loading_allowance = self
            .loading_allowance
            .min(self.sets.loading.len())
            .max(self.limits.max_concurrent_loading);
    }

    // ========================================
    // Admission
    // ========================================

    /// Pure admission query
    pub fn can_load(&self, id: &Uuid) -> bool {
        admission::can_load(id, &self.sets, &self.limits)
    }

    /// Claim a loading slot for `id`
    ///
    /// Re-checks admission at the moment of the transition. Only visible
    /// items can be admitted without a free slot; those are queued.
    pub fn try_begin_loading(&mut self, id: Uuid, now: Instant) -> BeginOutcome {
        if self.sets.is_loading(&id) || self.sets.is_loaded(&id) {
            return BeginOutcome::AlreadyActive;
        }
        if !self.can_load(&id) {
            debug!("Admission denied for {} ({})", id, self.stats());
            return BeginOutcome::Denied;
        }
        if !admission::has_loading_slot(&self.sets, &self.limits) {
            self.enqueue_deferred(id);
            debug!("No loading slot for {}, deferred ({})", id, self.stats());
            return BeginOutcome::Deferred;
        }

        self.remove_deferred(&id);
        self.sets.loading.insert(id);
        self.last_used.insert(id, now);
        BeginOutcome::Started
    }

    fn enqueue_deferred(&mut self, id: Uuid) {
        if !self.deferred.contains(&id) {
            self.deferred.push_back(id);
        }
    }

    /// Drop `id` from the deferred queue
    pub fn remove_deferred(&mut self, id: &Uuid) -> bool {
        let before = self.deferred.len();
        self.deferred.retain(|queued| queued != id);
        before != self.deferred.len()
    }

    pub fn is_deferred(&self, id: &Uuid) -> bool {
        self.deferred.contains(id)
    }

    /// Move the next queued item into `loading` if a slot is free
    ///
    /// Queued items that are no longer admissible (scrolled away while
    /// waiting, with capacity exhausted) are dropped.
    pub fn start_next_deferred(&mut self, now: Instant) -> Option<Uuid> {
        while admission::has_loading_slot(&self.sets, &self.limits) {
            let id = self.deferred.pop_front()?;
            if self.sets.is_loading(&id) || self.sets.is_loaded(&id) {
                continue;
            }
            if !self.can_load(&id) {
                debug!("Dropping deferred load of {} (no longer admitted)", id);
                continue;
            }
            self.sets.loading.insert(id);
            self.last_used.insert(id, now);
            return Some(id);
        }
        None
    }

    // ========================================
    // Lifecycle transitions
    // ========================================

    /// loading → loaded, atomically
    ///
    /// Returns false if `id` was not loading (late signal for a released item).
    pub fn complete_loading(&mut self, id: &Uuid, now: Instant) -> bool {
        if !self.sets.loading.remove(id) {
            return false;
        }
        self.settle_allowance();
        self.sets.loaded.insert(*id);
        self.last_used.insert(*id, now);
        true
    }

    /// Drop `id` from `loading` after a failed or abandoned attempt
    pub fn abort_loading(&mut self, id: &Uuid) -> bool {
        let removed = self.sets.loading.remove(id);
        self.settle_allowance();
        removed
    }

    /// loaded → playing
    pub fn mark_playing(&mut self, id: &Uuid, now: Instant) -> Result<()> {
        if !self.sets.is_loaded(id) {
            return Err(Error::InvalidTransition {
                item_id: *id,
                detail: "cannot play an item that is not loaded".to_string(),
            });
        }
        self.sets.playing.insert(*id);
        self.last_used.insert(*id, now);
        Ok(())
    }

    /// playing → loaded
    pub fn mark_paused(&mut self, id: &Uuid, now: Instant) -> bool {
        if self.sets.playing.remove(id) {
            self.last_used.insert(*id, now);
            true
        } else {
            false
        }
    }

    /// Record effective visibility; returns true if it changed
    pub fn set_visible(&mut self, id: Uuid, visible: bool, now: Instant) -> bool {
        let changed = if visible {
            self.sets.visible.insert(id)
        } else {
            self.sets.visible.remove(&id)
        };
        if changed {
            self.last_used.insert(id, now);
        }
        changed
    }

    /// Release the resource slot of `id` (keeps visibility)
    pub fn release(&mut self, id: &Uuid) -> bool {
        self.remove_deferred(id);
        let released = self.sets.release(id);
        self.settle_allowance();
        released
    }

    /// Remove every trace of `id` (catalog removal)
    pub fn forget(&mut self, id: &Uuid) {
        self.release(id);
        self.sets.visible.remove(id);
        self.last_used.remove(id);
    }

    // ========================================
    // Eviction
    // ========================================

    /// Propose a cleanup
    ///
    /// `None` while the throttle interval has not elapsed, when `loaded` is
    /// within `max_loaded`, or when every resident item is protected.
    /// Issuing a plan stamps the throttle; so does finding nothing
    /// evictable, which keeps a long playback from re-ranking every tick.
    pub fn perform_cleanup(&mut self, now: Instant) -> Option<CleanupPlan> {
        if !self.throttle.is_due(now) {
            debug!("Cleanup throttled");
            return None;
        }
        if self.sets.loaded.len() <= self.limits.max_loaded {
            return None;
        }

        let plan = eviction::plan_eviction(
            &self.sets.loaded,
            self.limits.max_loaded,
            |id| self.sets.is_protected(id),
            |id| self.rank_key(id),
        );

        self.throttle.stamp(now);
        match &plan {
            Some(plan) => {
                info!(
                    "Cleanup plan: evict {} of {} loaded (max {})",
                    plan.victims().len(),
                    self.sets.loaded.len(),
                    self.limits.max_loaded
                );
            }
            None => debug!(
                "{} loaded items exceed max {} but all are visible or playing",
                self.sets.loaded.len(),
                self.limits.max_loaded
            ),
        }
        plan
    }

    /// Apply a plan to the loaded set
    ///
    /// Victims that became visible or started playing after the plan was
    /// computed are kept. Returns the ids actually removed; the caller must
    /// detach their playback resources.
    pub fn apply_cleanup(&mut self, plan: &CleanupPlan, now: Instant) -> Vec<Uuid> {
        let removable: Vec<Uuid> = plan
            .victims()
            .iter()
            .filter(|id| self.sets.is_loaded(id) && !self.sets.is_protected(id))
            .copied()
            .collect();

        let narrowed;
        let effective = if removable.len() == plan.victims().len() {
            plan
        } else {
            debug!(
                "Cleanup plan narrowed from {} to {} victims",
                plan.victims().len(),
                removable.len()
            );
            narrowed = CleanupPlan::from_victims(removable.clone(), plan.target());
            &narrowed
        };

        self.sets.loaded = effective.apply(&self.sets.loaded);
        for id in &removable {
            self.last_used.remove(id);
        }
        self.throttle.stamp(now);
        removable
    }

    fn rank_key(&self, id: &Uuid) -> RankKey {
        RankKey {
            distance: self.viewport_distance(id),
            last_used: self.last_used.get(id).copied(),
        }
    }

    /// Catalog distance to the nearest visible item
    fn viewport_distance(&self, id: &Uuid) -> usize {
        let Some(&position) = self.positions.get(id) else {
            return usize::MAX;
        };
        self.sets
            .visible
            .iter()
            .filter_map(|visible| self.positions.get(visible))
            .map(|&visible_position| position.abs_diff(visible_position))
            .min()
            .unwrap_or(usize::MAX - 1)
    }

    // ========================================
    // Introspection
    // ========================================

    /// Loads currently allowed in flight (see `check_invariants`)
    pub fn loading_allowance(&self) -> usize {
        self.loading_allowance
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            visible: self.sets.visible.len(),
            loaded: self.sets.loaded.len(),
            loading: self.sets.loading.len(),
            playing: self.sets.playing.len(),
            deferred: self.deferred.len(),
            limits: self.limits,
        }
    }

    /// Verify the invariants listed in the module docs
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.sets.check_structure()?;
        if self.sets.loading.len() > self.loading_allowance {
            return Err(format!(
                "{} items loading, limit {} (allowance {})",
                self.sets.loading.len(),
                self.limits.max_concurrent_loading,
                self.loading_allowance
            ));
        }
        Ok(())
    }
}
