//! Visibility tracker
//!
//! Two independent inputs decide whether an item counts as visible:
//! - viewport intersection reports, and
//! - the owner's explicit mark (for hosts where intersection never fires).
//!
//! Effective visibility is the union of both. Each setter returns the new
//! effective value only when it flipped, so repeated or redundant signals
//! are no-ops for the caller.

use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct VisibilityTracker {
    intersecting: HashSet<Uuid>,
    owner_marked: HashSet<Uuid>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intersection report
    ///
    /// Returns `Some(visible)` if the effective visibility changed.
    pub fn report_intersection(&mut self, id: Uuid, intersecting: bool) -> Option<bool> {
        let before = self.is_visible(&id);
        if intersecting {
            self.intersecting.insert(id);
        } else {
            self.intersecting.remove(&id);
        }
        self.changed(&id, before)
    }

    /// Record the owner's out-of-band mark
    ///
    /// Returns `Some(visible)` if the effective visibility changed.
    pub fn set_owner_mark(&mut self, id: Uuid, marked: bool) -> Option<bool> {
        let before = self.is_visible(&id);
        if marked {
            self.owner_marked.insert(id);
        } else {
            self.owner_marked.remove(&id);
        }
        self.changed(&id, before)
    }

    fn changed(&self, id: &Uuid, before: bool) -> Option<bool> {
        let after = self.is_visible(id);
        (after != before).then_some(after)
    }

    pub fn is_visible(&self, id: &Uuid) -> bool {
        self.intersecting.contains(id) || self.owner_marked.contains(id)
    }

    pub fn is_intersecting(&self, id: &Uuid) -> bool {
        self.intersecting.contains(id)
    }

    pub fn is_owner_marked(&self, id: &Uuid) -> bool {
        self.owner_marked.contains(id)
    }

    /// Items the owner marked visible (backup load path)
    pub fn owner_marked(&self) -> impl Iterator<Item = &Uuid> {
        self.owner_marked.iter()
    }

    /// Every effectively visible item
    pub fn visible(&self) -> impl Iterator<Item = &Uuid> {
        self.intersecting
            .iter()
            .chain(self.owner_marked.iter().filter(|id| !self.intersecting.contains(id)))
    }

    /// Drop both signals for `id`; returns true if it was visible
    pub fn forget(&mut self, id: &Uuid) -> bool {
        let was_intersecting = self.intersecting.remove(id);
        let was_marked = self.owner_marked.remove(id);
        was_intersecting || was_marked
    }
}
