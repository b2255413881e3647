//! Host media stack seam
//!
//! The gallery never fetches or decodes anything itself. A `MediaBackend`
//! attaches a playback resource for a URL and reports readiness or a coded
//! failure; detaching is synchronous so eviction and unmount can release a
//! resource before the item state is reset.

use async_trait::async_trait;
use uuid::Uuid;

/// Failure reported by the media stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    /// Media-error code (see `failure` for the classification)
    pub code: u16,
    pub detail: String,
}

impl BackendFailure {
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.detail)
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync + 'static {
    /// Attach a playback resource for `url` and wait for its ready signal
    ///
    /// The future may be dropped at any point (the item was evicted or
    /// unmounted); `detach` is called afterwards in that case.
    async fn load(&self, item_id: Uuid, url: &str) -> Result<(), BackendFailure>;

    /// Release the playback resource of `item_id`, if any
    fn detach(&self, item_id: Uuid);

    /// Start playback of a loaded item
    fn play(&self, item_id: Uuid) -> Result<(), BackendFailure>;

    fn pause(&self, item_id: Uuid);
}
