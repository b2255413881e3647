//! Error types for vgal-media
//!
//! Media load failures are not errors in this sense: they are classified
//! and handled inside the per-item state machine (see `failure`). The
//! variants here cover programming/configuration mistakes surfaced to the
//! owner of the gallery.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for vgal-media
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from shared configuration/parameter handling
    #[error(transparent)]
    Common(#[from] vgal_common::Error),

    /// Operation referenced an item that is not in the catalog
    #[error("Unknown item: {0}")]
    UnknownItem(Uuid),

    /// Operation is not valid in the item's current state
    #[error("Invalid transition for {item_id}: {detail}")]
    InvalidTransition { item_id: Uuid, detail: String },

    /// Host media stack refused an operation
    #[error("Media backend error: {0}")]
    Backend(String),
}

/// Convenience Result type using vgal-media Error
pub type Result<T> = std::result::Result<T, Error>;
