//! Event types for the VGAL event system
//!
//! Provides the per-item lifecycle event definitions and the EventBus the
//! gallery publishes them on.

mod types;

pub use types::{FailureKind, StopReason};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Per-item lifecycle events
///
/// These replace UI callbacks: the gallery layer subscribes and renders
/// whatever it needs (spinner, poster frame, inline error marker).
/// Events can be serialized for logging or transmission to a UI process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MediaEvent {
    /// A load attempt began (resource URL constructed, listeners attached)
    LoadStarted {
        item_id: Uuid,
        /// 1-based attempt number
        attempt: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A load attempt ended
    LoadStopped {
        item_id: Uuid,
        reason: StopReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback resource attached and ready
    Loaded {
        item_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Item started playing
    Playing {
        item_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Item paused or stopped
    Paused {
        item_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Load attempt failed
    ///
    /// `terminal == true` means no further retry will happen and the item
    /// should show a persistent inline error marker.
    PlayError {
        item_id: Uuid,
        kind: FailureKind,
        /// Numeric code reported by the media stack
        code: u16,
        /// Attempt that failed (1-based)
        attempt: u32,
        terminal: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Effective visibility of an item flipped
    VisibilityChanged {
        item_id: Uuid,
        visible: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Resident item released by cleanup to free capacity
    Evicted {
        item_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Item removed from the catalog; all resources released
    Unmounted {
        item_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MediaEvent {
    /// Item this event refers to
    pub fn item_id(&self) -> Uuid {
        match self {
            MediaEvent::LoadStarted { item_id, .. }
            | MediaEvent::LoadStopped { item_id, .. }
            | MediaEvent::Loaded { item_id, .. }
            | MediaEvent::Playing { item_id, .. }
            | MediaEvent::Paused { item_id, .. }
            | MediaEvent::PlayError { item_id, .. }
            | MediaEvent::VisibilityChanged { item_id, .. }
            | MediaEvent::Evicted { item_id, .. }
            | MediaEvent::Unmounted { item_id, .. } => *item_id,
        }
    }

    /// Short variant name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::LoadStarted { .. } => "LoadStarted",
            MediaEvent::LoadStopped { .. } => "LoadStopped",
            MediaEvent::Loaded { .. } => "Loaded",
            MediaEvent::Playing { .. } => "Playing",
            MediaEvent::Paused { .. } => "Paused",
            MediaEvent::PlayError { .. } => "PlayError",
            MediaEvent::VisibilityChanged { .. } => "VisibilityChanged",
            MediaEvent::Evicted { .. } => "Evicted",
            MediaEvent::Unmounted { .. } => "Unmounted",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for media lifecycle events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use vgal_common::events::{EventBus, MediaEvent};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(MediaEvent::Loaded {
///     item_id: Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(MediaEvent::Loaded { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MediaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest ones are dropped (the subscriber then observes `Lagged`).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MediaEvent) -> Result<usize, broadcast::error::SendError<MediaEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MediaEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
