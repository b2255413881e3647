//! # VGAL Media Resource Manager (vgal-media)
//!
//! Keeps the playback resources of a virtualized video gallery within
//! bounds while every visible item still loads.
//!
//! **Purpose:** admission control and throttled eviction over a dynamic
//! capacity model, plus a per-item load state machine with failure
//! classification and retry/backoff.
//!
//! **Architecture:** `Gallery` owns a `ResourceManager` (tracking sets,
//! limits, cleanup throttle), a `VisibilityTracker` and one `ItemLoader`
//! per catalog item. The host media stack sits behind the `MediaBackend`
//! trait; lifecycle events go out on the `vgal_common` EventBus.

pub mod admission;
pub mod backend;
pub mod capacity;
pub mod catalog;
pub mod error;
pub mod eviction;
pub mod failure;
pub mod gallery;
pub mod item;
pub mod manager;
pub mod retry;
pub mod simulate;
pub mod source_url;
pub mod tracked;
pub mod visibility;

pub use backend::{BackendFailure, MediaBackend};
pub use catalog::{Catalog, CatalogItem};
pub use error::{Error, Result};
pub use gallery::Gallery;
pub use item::ItemLoadState;
pub use manager::{BeginOutcome, ResourceManager, ResourceStats};
