//! Eviction engine
//!
//! Decides which resident items to release when `loaded` exceeds
//! `max_loaded`. Deciding is separated from acting: the engine returns a
//! `CleanupPlan` (a reducer over the loaded set) and the resource manager
//! applies it and detaches the playback resources.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Minimum interval between effective cleanups
#[derive(Debug, Clone)]
pub struct CleanupThrottle {
    interval: Duration,
    last_cleanup_at: Option<Instant>,
}

impl CleanupThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_cleanup_at: None,
        }
    }

    /// True when no cleanup happened yet or the interval has elapsed
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_cleanup_at {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    pub fn stamp(&mut self, now: Instant) {
        self.last_cleanup_at = Some(now);
    }
}

/// Staleness of an eviction candidate
///
/// Candidates farther from the viewport go first; ties go to the one idle
/// for longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankKey {
    /// Catalog distance to the nearest visible item (`usize::MAX` if unknown)
    pub distance: usize,
    /// Last time the item was loaded, played, paused or seen
    pub last_used: Option<Instant>,
}

impl RankKey {
    /// Eviction order: `Less` means `self` is evicted before `other`
    fn eviction_order(&self, other: &Self) -> Ordering {
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| self.last_used.cmp(&other.last_used))
    }
}

/// Proposed transition of the loaded set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    victims: Vec<Uuid>,
    target: usize,
}

impl CleanupPlan {
    pub(crate) fn from_victims(victims: Vec<Uuid>, target: usize) -> Self {
        Self { victims, target }
    }

    /// Items to release, most stale first
    pub fn victims(&self) -> &[Uuid] {
        &self.victims
    }

    /// `max_loaded` the plan was computed for
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_empty(&self) -> bool {
        self.victims.is_empty()
    }

    /// Post-eviction loaded set
    pub fn apply(&self, loaded: &HashSet<Uuid>) -> HashSet<Uuid> {
        loaded
            .iter()
            .filter(|id| !self.victims.contains(id))
            .copied()
            .collect()
    }
}

/// Compute the minimal removal set that brings `loaded` down to `max_loaded`
///
/// Protected items are never selected. If there are not enough unprotected
/// candidates all of them are selected and the remaining excess stays.
/// Returns `None` when nothing is over the limit or nothing may be evicted.
pub fn plan_eviction<P, R>(
    loaded: &HashSet<Uuid>,
    max_loaded: usize,
    is_protected: P,
    rank: R,
) -> Option<CleanupPlan>
where
    P: Fn(&Uuid) -> bool,
    R: Fn(&Uuid) -> RankKey,
{
    let excess = loaded.len().checked_sub(max_loaded).filter(|&n| n > 0)?;

    let mut candidates: Vec<(Uuid, RankKey)> = loaded
        .iter()
        .filter(|id| !is_protected(id))
        .map(|id| (*id, rank(id)))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|(a_id, a), (b_id, b)| a.eviction_order(b).then_with(|| a_id.cmp(b_id)));
    candidates.truncate(excess);

    Some(CleanupPlan {
        victims: candidates.into_iter().map(|(id, _)| id).collect(),
        target: max_loaded,
    })
}
