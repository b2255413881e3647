//! Admission controller
//!
//! Pure reads over the tracking sets and current limits. Nothing here
//! mutates state: callers re-check right before moving an item into
//! `loading`, and any over-admission is corrected later by eviction.

use crate::capacity::CapacityLimits;
use crate::tracked::TrackedSets;
use uuid::Uuid;

/// May `id` start (or keep) a playback resource?
///
/// Visible items are always admitted; resident items are admitted
/// idempotently; anything else needs headroom in both limits.
pub fn can_load(id: &Uuid, sets: &TrackedSets, limits: &CapacityLimits) -> bool {
    if sets.is_visible(id) || sets.is_loaded(id) {
        return true;
    }
    sets.loaded.len() < limits.max_loaded && sets.loading.len() < limits.max_concurrent_loading
}

/// Is there a free in-flight slot right now?
pub fn has_loading_slot(sets: &TrackedSets, limits: &CapacityLimits) -> bool {
    sets.loading.len() < limits.max_concurrent_loading
}
