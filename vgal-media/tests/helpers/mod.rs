//! Test helpers for vgal-media integration tests
//!
//! Provides reusable fixtures:
//! - parameter sets with small, predictable limits
//! - synthetic catalogs
//! - a gallery wired to the scripted backend plus an event receiver

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;
use vgal_common::events::{EventBus, MediaEvent};
use vgal_common::params::{CapacityTier, GalleryParams};
use vgal_media::simulate::ScriptedBackend;
use vgal_media::source_url::resource_url;
use vgal_media::{CatalogItem, Gallery};

pub const LATENCY: Duration = Duration::from_millis(50);

/// Built-in defaults (tiered tables, 2 s throttle, 3 attempts)
pub fn default_params() -> GalleryParams {
    GalleryParams::default()
}

/// One unbounded tier with the given limits in both modes
pub fn tight_params(max_loaded: usize, max_concurrent_loading: usize) -> GalleryParams {
    let mut params = GalleryParams::default();
    let tier = CapacityTier {
        max_items: None,
        max_loaded,
        max_concurrent_loading,
    };
    params.capacity.constrained = vec![tier];
    params.capacity.generous = vec![tier];
    params.cleanup.throttle_ms = 100;
    params.validate().expect("test params must be valid");
    params
}

pub fn local_items(count: usize) -> Vec<CatalogItem> {
    (0..count)
        .map(|index| CatalogItem::local(format!("/media/clips/clip {:03}.mp4", index)))
        .collect()
}

pub fn url_of(item: &CatalogItem) -> String {
    resource_url(item)
}

pub struct Fixture {
    pub gallery: Gallery<ScriptedBackend>,
    pub backend: Arc<ScriptedBackend>,
    pub events: broadcast::Receiver<MediaEvent>,
    pub ids: Vec<Uuid>,
}

pub fn fixture(params: &GalleryParams, items: Vec<CatalogItem>) -> Fixture {
    fixture_with_backend(params, items, ScriptedBackend::new(LATENCY))
}

/// Scripts must be installed before the catalog, hence the prepared backend
pub fn fixture_with_backend(
    params: &GalleryParams,
    items: Vec<CatalogItem>,
    backend: ScriptedBackend,
) -> Fixture {
    let backend = Arc::new(backend);
    let bus = EventBus::new(4096);
    let events = bus.subscribe();
    let ids = items.iter().map(|item| item.id).collect();

    let mut gallery = Gallery::new(params, Arc::clone(&backend), bus).expect("valid params");
    gallery.set_catalog(items, None);

    Fixture {
        gallery,
        backend,
        events,
        ids,
    }
}

/// Everything delivered so far
pub fn drain_events(rx: &mut broadcast::Receiver<MediaEvent>) -> Vec<MediaEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn events_for(events: &[MediaEvent], id: Uuid) -> Vec<&'static str> {
    events
        .iter()
        .filter(|event| event.item_id() == id)
        .map(|event| event.name())
        .collect()
}
