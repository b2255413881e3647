//! Gallery
//!
//! Single owner of the catalog, the resource manager, the visibility
//! tracker and one `ItemLoader` per item. All state mutation happens on
//! `&mut self`; backend loads and retry timers run as spawned tasks that
//! only send a `Signal` back over an mpsc channel. The owner drives the
//! gallery by calling the visibility/play operations, `tick` on a timer,
//! and `process_next` to apply completions.
//!
//! Eviction and unmount abort the item's task and detach its resource
//! synchronously before resetting the loader. A signal that was already in
//! flight carries an old generation and is dropped.

use crate::backend::{BackendFailure, MediaBackend};
use crate::capacity::{CapacityMode, CapacityPolicy};
use crate::catalog::{Catalog, CatalogItem};
use crate::error::{Error, Result};
use crate::item::{FailureOutcome, ItemLoadState, ItemLoader, LoadTicket, PlayOutcome, ReadyOutcome};
use crate::manager::{BeginOutcome, ResourceManager, ResourceStats};
use crate::retry::RetryPolicy;
use crate::visibility::VisibilityTracker;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vgal_common::events::{EventBus, MediaEvent, StopReason};
use vgal_common::params::GalleryParams;
use vgal_common::time;

/// Completion reported by a spawned task
#[derive(Debug)]
enum Signal {
    LoadFinished {
        item_id: Uuid,
        generation: u64,
        result: std::result::Result<(), BackendFailure>,
    },
    RetryDue {
        item_id: Uuid,
        generation: u64,
    },
}

pub struct Gallery<B: MediaBackend> {
    backend: Arc<B>,
    catalog: Catalog,
    manager: ResourceManager,
    visibility: VisibilityTracker,
    items: HashMap<Uuid, ItemLoader>,

    /// In-flight load or armed retry timer per item (at most one)
    tasks: HashMap<Uuid, JoinHandle<()>>,

    retry_policy: RetryPolicy,
    prefetch_margin: usize,
    events: EventBus,

    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
}

impl<B: MediaBackend> Gallery<B> {
    /// Build an empty gallery; parameters are validated first
    pub fn new(params: &GalleryParams, backend: Arc<B>, events: EventBus) -> Result<Self> {
        params.validate()?;
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let policy = CapacityPolicy::new(params.capacity.clone());
        let mode = policy.default_mode();
        let manager = ResourceManager::new(
            policy,
            mode,
            time::millis_to_duration(params.cleanup.throttle_ms),
        );

        Ok(Self {
            backend,
            catalog: Catalog::default(),
            manager,
            visibility: VisibilityTracker::new(),
            items: HashMap::new(),
            tasks: HashMap::new(),
            retry_policy: RetryPolicy::new(&params.retry),
            prefetch_margin: params.visibility.prefetch_margin,
            events,
            signal_tx,
            signal_rx,
        })
    }

    // ========================================
    // Catalog and mode
    // ========================================

    /// Install a new catalog
    ///
    /// Items no longer present (or whose locator changed) are unmounted.
    /// Limits are recomputed from the new size and, if given, the new mode.
    pub fn set_catalog(&mut self, items: Vec<CatalogItem>, mode: Option<CapacityMode>) {
        let removed: Vec<Uuid> = {
            let incoming: HashMap<Uuid, &CatalogItem> = items.iter().map(|item| (item.id, item)).collect();
            self.items
                .iter()
                .filter(|(id, loader)| incoming.get(*id).map_or(true, |item| *item != loader.item()))
                .map(|(id, _)| *id)
                .collect()
        };
        for id in &removed {
            self.unmount_item(id);
            self.items.remove(id);
        }

        for item in &items {
            self.items
                .entry(item.id)
                .or_insert_with(|| ItemLoader::new(item.clone()));
        }

        if let Some(mode) = mode {
            self.manager.set_mode(mode);
        }
        self.manager.set_catalog_order(items.iter().map(|item| item.id));
        self.catalog = Catalog::new(items);
        // Unmounted loads freed their slots
        self.drain_deferred();

        info!(
            "Catalog set: {} items ({} removed), {}",
            self.catalog.len(),
            removed.len(),
            self.manager.stats()
        );
    }

    pub fn set_mode(&mut self, mode: CapacityMode) {
        self.manager.set_mode(mode);
        self.drain_deferred();
    }

    // ========================================
    // Visibility
    // ========================================

    /// Viewport intersection report
    pub fn report_intersection(&mut self, id: Uuid, intersecting: bool) -> Result<()> {
        self.ensure_known(&id)?;
        if let Some(visible) = self.visibility.report_intersection(id, intersecting) {
            self.on_visibility_changed(id, visible);
        }
        Ok(())
    }

    /// Owner's out-of-band visibility mark (backup path)
    ///
    /// Loads the item if it is idle, even when no intersection report ever
    /// arrives. Repeating the mark never issues a second load.
    pub fn mark_visible(&mut self, id: Uuid, visible: bool) -> Result<()> {
        self.ensure_known(&id)?;
        match self.visibility.set_owner_mark(id, visible) {
            Some(changed) => self.on_visibility_changed(id, changed),
            None if visible => self.request_load(id),
            None => {}
        }
        Ok(())
    }

    fn on_visibility_changed(&mut self, id: Uuid, visible: bool) {
        let now = Instant::now();
        self.manager.set_visible(id, visible, now);
        debug!("Item {} visible={}", id, visible);
        self.emit(MediaEvent::VisibilityChanged {
            item_id: id,
            visible,
            timestamp: time::now(),
        });
        if visible {
            self.request_load(id);
        }
    }

    // ========================================
    // Playback
    // ========================================

    /// Play request; a not yet loaded item plays once its load completes
    pub fn request_play(&mut self, id: Uuid) -> Result<()> {
        let loader = self.items.get_mut(&id).ok_or(Error::UnknownItem(id))?;
        match loader.play()? {
            PlayOutcome::Started => self.start_playback(id),
            PlayOutcome::AlreadyPlaying => Ok(()),
            PlayOutcome::Pending => {
                debug!("Play of {} pending until loaded", id);
                if loader.is_idle() {
                    self.request_load(id);
                }
                Ok(())
            }
        }
    }

    pub fn request_pause(&mut self, id: Uuid) -> Result<()> {
        let loader = self.items.get_mut(&id).ok_or(Error::UnknownItem(id))?;
        if loader.pause() {
            self.backend.pause(id);
            self.manager.mark_paused(&id, Instant::now());
            self.emit(MediaEvent::Paused {
                item_id: id,
                timestamp: time::now(),
            });
        }
        Ok(())
    }

    /// Loader already moved to Playing; mirror it in the backend and sets
    fn start_playback(&mut self, id: Uuid) -> Result<()> {
        if let Err(failure) = self.backend.play(id) {
            if let Some(loader) = self.items.get_mut(&id) {
                loader.pause();
            }
            warn!("Backend refused to play {}: {}", id, failure);
            return Err(Error::Backend(failure.to_string()));
        }

        if let Err(e) = self.manager.mark_playing(&id, Instant::now()) {
            if let Some(loader) = self.items.get_mut(&id) {
                loader.pause();
            }
            self.backend.pause(id);
            return Err(e);
        }

        info!("Playing {}", id);
        self.emit(MediaEvent::Playing {
            item_id: id,
            timestamp: time::now(),
        });
        Ok(())
    }

    // ========================================
    // Unmount / manual retry
    // ========================================

    /// Release every resource of `id` and forget its visibility
    ///
    /// The item stays in the catalog and may load again once visible.
    pub fn unmount(&mut self, id: Uuid) -> Result<()> {
        self.ensure_known(&id)?;
        self.unmount_item(&id);
        self.drain_deferred();
        Ok(())
    }

    fn unmount_item(&mut self, id: &Uuid) {
        self.abort_task(id);
        let Some(loader) = self.items.get_mut(id) else {
            return;
        };
        let was_loading = loader.state() == ItemLoadState::Loading;
        if loader.has_resource() {
            self.backend.detach(*id);
        }
        loader.reset();
        self.manager.forget(id);
        self.visibility.forget(id);

        if was_loading {
            self.emit(MediaEvent::LoadStopped {
                item_id: *id,
                reason: StopReason::Unmounted,
                timestamp: time::now(),
            });
        }
        self.emit(MediaEvent::Unmounted {
            item_id: *id,
            timestamp: time::now(),
        });
        debug!("Unmounted {}", id);
    }

    /// Clear a terminal failure; reloads at once if the item is visible
    pub fn retry(&mut self, id: Uuid) -> Result<()> {
        let loader = self.items.get_mut(&id).ok_or(Error::UnknownItem(id))?;
        loader.manual_retry()?;
        info!("Manual retry of {}", id);
        if self.visibility.is_visible(&id) {
            self.request_load(id);
        }
        Ok(())
    }

    // ========================================
    // Periodic work
    // ========================================

    /// Periodic pass: backup loads, prefetch, throttled cleanup
    ///
    /// Returns the ids evicted by this pass.
    pub fn tick(&mut self) -> Vec<Uuid> {
        // Backup path: owner-marked items that never got a load
        let idle_marked: Vec<Uuid> = self
            .visibility
            .owner_marked()
            .filter(|id| self.items.get(id).is_some_and(|loader| loader.is_idle()))
            .copied()
            .collect();
        for id in idle_marked {
            debug!("Backup load trigger for {}", id);
            self.request_load(id);
        }

        if self.prefetch_margin > 0 {
            self.prefetch();
        }

        let evicted = self.cleanup();
        self.drain_deferred();
        evicted
    }

    fn prefetch(&mut self) {
        let mut anchors: Vec<usize> = self
            .visibility
            .visible()
            .filter_map(|id| self.catalog.position(id))
            .collect();
        anchors.sort_unstable();

        let mut seen = HashSet::new();
        for anchor in anchors {
            for id in self.catalog.neighbours(anchor, self.prefetch_margin) {
                if !seen.insert(id) {
                    continue;
                }
                if !self.items.get(&id).is_some_and(|loader| loader.is_idle()) {
                    continue;
                }
                if !self.manager.can_load(&id) {
                    debug!("Prefetch stopped at capacity ({})", self.manager.stats());
                    return;
                }
                self.request_load(id);
            }
        }
    }

    fn cleanup(&mut self) -> Vec<Uuid> {
        let now = Instant::now();
        let Some(plan) = self.manager.perform_cleanup(now) else {
            return Vec::new();
        };

        let removed = self.manager.apply_cleanup(&plan, now);
        for id in &removed {
            self.abort_task(id);
            self.backend.detach(*id);
            if let Some(loader) = self.items.get_mut(id) {
                loader.reset();
            }
            self.emit(MediaEvent::Evicted {
                item_id: *id,
                timestamp: time::now(),
            });
        }
        if !removed.is_empty() {
            info!("Evicted {} items ({})", removed.len(), self.manager.stats());
        }
        removed
    }

    // ========================================
    // Loading
    // ========================================

    /// Start a load for an idle item if admission allows it
    fn request_load(&mut self, id: Uuid) {
        if !self.items.get(&id).is_some_and(|loader| loader.is_idle()) {
            return;
        }
        if self.manager.is_deferred(&id) {
            return;
        }

        match self.manager.try_begin_loading(id, Instant::now()) {
            BeginOutcome::Started => self.start_attempt(id),
            BeginOutcome::Deferred => debug!("Load of {} waiting for a slot", id),
            BeginOutcome::Denied | BeginOutcome::AlreadyActive => {}
        }
    }

    /// The manager already placed `id` in `loading`
    fn start_attempt(&mut self, id: Uuid) {
        let ticket = match self.items.get_mut(&id).map(|loader| loader.begin_load()) {
            Some(Ok(ticket)) => ticket,
            Some(Err(e)) => {
                warn!("Not starting load: {}", e);
                self.manager.abort_loading(&id);
                return;
            }
            None => {
                self.manager.abort_loading(&id);
                return;
            }
        };

        info!("Loading {} (attempt {})", id, ticket.attempt);
        self.emit(MediaEvent::LoadStarted {
            item_id: id,
            attempt: ticket.attempt,
            timestamp: time::now(),
        });
        self.spawn_load(ticket);
    }

    fn spawn_load(&mut self, ticket: LoadTicket) {
        let backend = Arc::clone(&self.backend);
        let tx = self.signal_tx.clone();
        let item_id = ticket.item_id;

        let handle = tokio::spawn(async move {
            let result = backend.load(ticket.item_id, &ticket.url).await;
            let _ = tx.send(Signal::LoadFinished {
                item_id: ticket.item_id,
                generation: ticket.generation,
                result,
            });
        });
        self.replace_task(item_id, handle);
    }

    fn spawn_retry_timer(&mut self, item_id: Uuid, generation: u64, delay: Duration) {
        let tx = self.signal_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Signal::RetryDue { item_id, generation });
        });
        self.replace_task(item_id, handle);
    }

    fn replace_task(&mut self, id: Uuid, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(id, handle) {
            previous.abort();
        }
    }

    fn abort_task(&mut self, id: &Uuid) {
        if let Some(handle) = self.tasks.remove(id) {
            handle.abort();
        }
    }

    fn drain_deferred(&mut self) {
        while let Some(id) = self.manager.start_next_deferred(Instant::now()) {
            self.start_attempt(id);
        }
    }

    // ========================================
    // Signal processing
    // ========================================

    /// True while a load or retry timer is outstanding
    pub fn has_pending_work(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Wait for and apply the next completion or retry timer
    ///
    /// Returns immediately when nothing is outstanding.
    pub async fn process_next(&mut self) {
        if !self.has_pending_work() {
            return;
        }
        if let Some(signal) = self.signal_rx.recv().await {
            self.handle_signal(signal);
        }
    }

    /// Apply one already delivered signal without waiting
    pub fn try_process(&mut self) -> bool {
        match self.signal_rx.try_recv() {
            Ok(signal) => {
                self.handle_signal(signal);
                true
            }
            Err(_) => false,
        }
    }

    /// Process signals until no load or retry timer is outstanding
    pub async fn settle(&mut self) {
        while self.has_pending_work() {
            self.process_next().await;
        }
        while self.try_process() {}
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::LoadFinished {
                item_id,
                generation,
                result,
            } => self.on_load_finished(item_id, generation, result),
            Signal::RetryDue { item_id, generation } => self.on_retry_due(item_id, generation),
        }
    }

    fn on_load_finished(
        &mut self,
        id: Uuid,
        generation: u64,
        result: std::result::Result<(), BackendFailure>,
    ) {
        let Some(loader) = self.items.get_mut(&id) else {
            debug!("Ignoring load result for removed item {}", id);
            return;
        };
        if loader.generation() != generation {
            debug!("Ignoring stale load result for {}", id);
            return;
        }
        self.tasks.remove(&id);

        match result {
            Ok(()) => match loader.on_ready(generation) {
                ReadyOutcome::Stale => debug!("Ignoring stale ready signal for {}", id),
                ReadyOutcome::Loaded { play_pending } => {
                    if !self.manager.complete_loading(&id, Instant::now()) {
                        warn!("Load of {} completed but it was not tracked as loading", id);
                    }
                    info!("Loaded {}", id);
                    self.emit(MediaEvent::LoadStopped {
                        item_id: id,
                        reason: StopReason::Ready,
                        timestamp: time::now(),
                    });
                    self.emit(MediaEvent::Loaded {
                        item_id: id,
                        timestamp: time::now(),
                    });
                    if play_pending {
                        if let Some(loader) = self.items.get_mut(&id) {
                            if let Ok(PlayOutcome::Started) = loader.play() {
                                if let Err(e) = self.start_playback(id) {
                                    warn!("Pending play of {} failed: {}", id, e);
                                }
                            }
                        }
                    }
                }
            },
            Err(failure) => {
                let outcome = loader.on_failure(generation, failure.code, &self.retry_policy);
                let retry_generation = loader.generation();
                self.on_load_failed(id, retry_generation, outcome, &failure);
            }
        }

        self.drain_deferred();
    }

    fn on_load_failed(
        &mut self,
        id: Uuid,
        generation: u64,
        outcome: FailureOutcome,
        reported: &BackendFailure,
    ) {
        let (failure, terminal, delay) = match outcome {
            FailureOutcome::Stale => {
                debug!("Ignoring stale failure signal for {}", id);
                return;
            }
            FailureOutcome::Retry { failure, delay } => (failure, false, Some(delay)),
            FailureOutcome::Terminal { failure } => (failure, true, None),
        };

        self.manager.abort_loading(&id);
        self.backend.detach(id);
        self.emit(MediaEvent::LoadStopped {
            item_id: id,
            reason: StopReason::Failed,
            timestamp: time::now(),
        });
        self.emit(MediaEvent::PlayError {
            item_id: id,
            kind: failure.kind,
            code: failure.code,
            attempt: failure.attempt,
            terminal,
            timestamp: time::now(),
        });

        match delay {
            Some(delay) => {
                debug!(
                    "Load of {} failed with {} ({}); retrying in {:?}",
                    id, failure, reported.detail, delay
                );
                self.spawn_retry_timer(id, generation, delay);
            }
            None => warn!(
                "Load of {} failed terminally with {} ({})",
                id, failure, reported.detail
            ),
        }
    }

    fn on_retry_due(&mut self, id: Uuid, generation: u64) {
        let Some(loader) = self.items.get_mut(&id) else {
            return;
        };
        if !loader.retry_due(generation) {
            debug!("Ignoring stale retry timer for {}", id);
            return;
        }
        self.tasks.remove(&id);

        match self.manager.try_begin_loading(id, Instant::now()) {
            BeginOutcome::Started => self.start_attempt(id),
            BeginOutcome::Deferred => {
                // Loader must be idle for the queue to start it later
                loader.park();
                debug!("Retry of {} waiting for a slot", id);
            }
            BeginOutcome::Denied | BeginOutcome::AlreadyActive => {
                loader.park();
                debug!("Retry of {} no longer admitted; back to idle", id);
            }
        }
    }

    // ========================================
    // Introspection
    // ========================================

    pub fn state(&self, id: &Uuid) -> Option<ItemLoadState> {
        self.items.get(id).map(|loader| loader.state())
    }

    pub fn can_load(&self, id: &Uuid) -> bool {
        self.manager.can_load(id)
    }

    pub fn stats(&self) -> ResourceStats {
        self.manager.stats()
    }

    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn ensure_known(&self, id: &Uuid) -> Result<()> {
        if self.items.contains_key(id) {
            Ok(())
        } else {
            Err(Error::UnknownItem(*id))
        }
    }

    fn emit(&self, event: MediaEvent) {
        self.events.emit_lossy(event);
    }
}

impl<B: MediaBackend> Drop for Gallery<B> {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}
