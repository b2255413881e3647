//! # VGAL Common Library
//!
//! Shared code for the video gallery media crates including:
//! - Error types
//! - Lifecycle event types (MediaEvent enum) and EventBus
//! - Tunable parameters (capacity tiers, retry budget, cleanup throttle)
//! - Configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod params;
pub mod time;

pub use error::{Error, Result};
pub use params::{CapacityMode, GalleryParams};
