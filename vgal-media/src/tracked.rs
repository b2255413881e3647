//! The four tracking sets owned by the resource manager

use std::collections::HashSet;
use uuid::Uuid;

/// Visible / loaded / loading / playing membership
///
/// Only `ResourceManager` mutates these; everything else gets `&TrackedSets`.
#[derive(Debug, Clone, Default)]
pub struct TrackedSets {
    pub(crate) visible: HashSet<Uuid>,
    pub(crate) loaded: HashSet<Uuid>,
    pub(crate) loading: HashSet<Uuid>,
    pub(crate) playing: HashSet<Uuid>,
}

impl TrackedSets {
    pub fn visible(&self) -> &HashSet<Uuid> {
        &self.visible
    }

    pub fn loaded(&self) -> &HashSet<Uuid> {
        &self.loaded
    }

    pub fn loading(&self) -> &HashSet<Uuid> {
        &self.loading
    }

    pub fn playing(&self) -> &HashSet<Uuid> {
        &self.playing
    }

    pub fn is_visible(&self, id: &Uuid) -> bool {
        self.visible.contains(id)
    }

    pub fn is_loaded(&self, id: &Uuid) -> bool {
        self.loaded.contains(id)
    }

    pub fn is_loading(&self, id: &Uuid) -> bool {
        self.loading.contains(id)
    }

    pub fn is_playing(&self, id: &Uuid) -> bool {
        self.playing.contains(id)
    }

    /// Visible or playing items; never evicted
    pub fn is_protected(&self, id: &Uuid) -> bool {
        self.visible.contains(id) || self.playing.contains(id)
    }

    /// Drop an item from every set except `visible`
    pub(crate) fn release(&mut self, id: &Uuid) -> bool {
        let was_loading = self.loading.remove(id);
        let was_loaded = self.loaded.remove(id);
        self.playing.remove(id);
        was_loading || was_loaded
    }

    /// Structural invariants: playing ⊆ loaded, loading ∩ loaded = ∅
    pub fn check_structure(&self) -> Result<(), String> {
        if let Some(id) = self.playing.iter().find(|id| !self.loaded.contains(id)) {
            return Err(format!("{} is playing but not loaded", id));
        }
        if let Some(id) = self.loading.iter().find(|id| self.loaded.contains(id)) {
            return Err(format!("{} is both loading and loaded", id));
        }
        Ok(())
    }
}
