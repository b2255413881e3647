//! Tunable gallery parameters
//!
//! All environment-tuned constants of the resource manager live here:
//! capacity tiers per runtime mode, the retry budget, the cleanup throttle
//! and the prefetch margin. Every value has a built-in default so a missing
//! config file (or a missing section) yields a working configuration.
//!
//! # Usage
//!
//! ```rust
//! use vgal_common::params::GalleryParams;
//!
//! let params = GalleryParams::default();
//! params.validate().unwrap();
//! assert_eq!(params.cleanup.throttle_ms, 2000);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Runtime mode feeding the capacity policy
///
/// `Generous` is meant for small or interactive catalogs (and development
/// builds), `Constrained` for large catalogs on modest hardware.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapacityMode {
    #[default]
    Constrained,
    Generous,
}

impl std::fmt::Display for CapacityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityMode::Constrained => write!(f, "constrained"),
            CapacityMode::Generous => write!(f, "generous"),
        }
    }
}

impl std::str::FromStr for CapacityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "constrained" => Ok(CapacityMode::Constrained),
            "generous" => Ok(CapacityMode::Generous),
            other => Err(Error::InvalidInput(format!("unknown capacity mode '{}'", other))),
        }
    }
}

/// One row of a capacity table
///
/// Applies to catalogs with at most `max_items` entries. The last tier of a
/// table may leave `max_items` unset to cover every larger catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityTier {
    #[serde(default)]
    pub max_items: Option<usize>,
    pub max_loaded: usize,
    pub max_concurrent_loading: usize,
}

impl CapacityTier {
    const fn new(max_items: Option<usize>, max_loaded: usize, max_concurrent_loading: usize) -> Self {
        Self {
            max_items,
            max_loaded,
            max_concurrent_loading,
        }
    }
}

/// Capacity tables for both runtime modes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CapacityParams {
    /// Mode used when the caller does not pick one explicitly
    ///
    /// Default: constrained
    pub mode: CapacityMode,

    /// Tiers for `CapacityMode::Constrained`, ascending by `max_items`
    ///
    /// Default: ≤100 → 30/4, ≤500 → 20/3, ≤2000 → 15/2, larger → 10/2
    pub constrained: Vec<CapacityTier>,

    /// Tiers for `CapacityMode::Generous`, ascending by `max_items`
    ///
    /// Default: ≤100 → 40/4, ≤500 → 30/4, ≤2000 → 24/3, larger → 16/3
    pub generous: Vec<CapacityTier>,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            mode: CapacityMode::Constrained,
            constrained: vec![
                CapacityTier::new(Some(100), 30, 4),
                CapacityTier::new(Some(500), 20, 3),
                CapacityTier::new(Some(2000), 15, 2),
                CapacityTier::new(None, 10, 2),
            ],
            generous: vec![
                CapacityTier::new(Some(100), 40, 4),
                CapacityTier::new(Some(500), 30, 4),
                CapacityTier::new(Some(2000), 24, 3),
                CapacityTier::new(None, 16, 3),
            ],
        }
    }
}

impl CapacityParams {
    /// Tier table for a mode
    pub fn tiers(&self, mode: CapacityMode) -> &[CapacityTier] {
        match mode {
            CapacityMode::Constrained => &self.constrained,
            CapacityMode::Generous => &self.generous,
        }
    }
}

/// Retry budget for failed load attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryParams {
    /// Load attempts per item before the failure becomes terminal
    ///
    /// Valid range: [1, 10]
    /// Default: 3
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every further attempt
    ///
    /// Default: 500 ms
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay
    ///
    /// Default: 4000 ms
    pub max_delay_ms: u64,

    /// Upper bound for the sum of all backoff delays of one item
    ///
    /// Default: 15000 ms
    pub max_total_window_ms: u64,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            max_total_window_ms: 15_000,
        }
    }
}

/// Eviction throttle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanupParams {
    /// Minimum interval between two effective cleanups
    ///
    /// Valid range: [100, 60000] ms
    /// Default: 2000 ms
    pub throttle_ms: u64,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self { throttle_ms: 2000 }
    }
}

/// Visibility-driven loading
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VisibilityParams {
    /// Catalog neighbours (in positions) of a visible item that may be
    /// preloaded when admission allows it. 0 disables prefetching.
    pub prefetch_margin: usize,
}

/// All tunable parameters of the gallery
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GalleryParams {
    pub capacity: CapacityParams,
    pub retry: RetryParams,
    pub cleanup: CleanupParams,
    pub visibility: VisibilityParams,
}

impl GalleryParams {
    /// Reject parameter sets the resource manager cannot honour
    pub fn validate(&self) -> Result<()> {
        for mode in [CapacityMode::Constrained, CapacityMode::Generous] {
            validate_tiers(mode, self.capacity.tiers(mode))?;
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 || retry.max_attempts > 10 {
            return Err(Error::Config(format!(
                "retry.max_attempts must be in [1, 10], got {}",
                retry.max_attempts
            )));
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(Error::Config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                retry.base_delay_ms, retry.max_delay_ms
            )));
        }
        if retry.max_total_window_ms < retry.base_delay_ms {
            return Err(Error::Config(format!(
                "retry.max_total_window_ms ({}) is shorter than one backoff delay ({})",
                retry.max_total_window_ms, retry.base_delay_ms
            )));
        }

        if !(100..=60_000).contains(&self.cleanup.throttle_ms) {
            return Err(Error::Config(format!(
                "cleanup.throttle_ms must be in [100, 60000], got {}",
                self.cleanup.throttle_ms
            )));
        }

        Ok(())
    }
}

fn validate_tiers(mode: CapacityMode, tiers: &[CapacityTier]) -> Result<()> {
    if tiers.is_empty() {
        return Err(Error::Config(format!("capacity.{} has no tiers", mode)));
    }

    let mut previous_bound: Option<usize> = None;
    for (index, tier) in tiers.iter().enumerate() {
        if tier.max_concurrent_loading == 0 || tier.max_loaded == 0 {
            return Err(Error::Config(format!(
                "capacity.{}[{}]: limits must be positive",
                mode, index
            )));
        }
        if tier.max_concurrent_loading >= tier.max_loaded {
            return Err(Error::Config(format!(
                "capacity.{}[{}]: max_concurrent_loading ({}) must be below max_loaded ({})",
                mode, index, tier.max_concurrent_loading, tier.max_loaded
            )));
        }
        match tier.max_items {
            Some(bound) => {
                if previous_bound.is_some_and(|prev| bound <= prev) {
                    return Err(Error::Config(format!(
                        "capacity.{}[{}]: tiers must be sorted by ascending max_items",
                        mode, index
                    )));
                }
                previous_bound = Some(bound);
            }
            None if index + 1 != tiers.len() => {
                return Err(Error::Config(format!(
                    "capacity.{}[{}]: only the last tier may be unbounded",
                    mode, index
                )));
            }
            None => {}
        }
    }

    Ok(())
}
