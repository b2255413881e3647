//! Capacity policy
//!
//! Maps catalog size and runtime mode to the two limits the resource
//! manager enforces. Limits shrink as the catalog grows (bounding peak
//! decoder/handle usage on large catalogs) and grow in `Generous` mode.

use vgal_common::params::{CapacityParams, CapacityTier};

pub use vgal_common::params::CapacityMode;

/// Limits enforced by admission and eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimits {
    /// Maximum resident (loaded) items
    pub max_loaded: usize,
    /// Maximum items with an in-flight load
    pub max_concurrent_loading: usize,
}

/// Fallback used only if a tier table is empty (validated configs never are)
const FALLBACK_LIMITS: CapacityLimits = CapacityLimits {
    max_loaded: 10,
    max_concurrent_loading: 2,
};

/// Tier-table backed capacity policy
#[derive(Debug, Clone, Default)]
pub struct CapacityPolicy {
    params: CapacityParams,
}

impl CapacityPolicy {
    pub fn new(params: CapacityParams) -> Self {
        Self { params }
    }

    /// Default mode from configuration
    pub fn default_mode(&self) -> CapacityMode {
        self.params.mode
    }

    /// Limits for a catalog of `total_items` in `mode`
    ///
    /// Total for every input: the first tier whose bound covers the catalog
    /// wins; catalogs beyond the last bound use the last tier.
    pub fn limits(&self, total_items: usize, mode: CapacityMode) -> CapacityLimits {
        let tiers = self.params.tiers(mode);
        let tier = tiers
            .iter()
            .find(|tier| tier.max_items.map_or(true, |bound| total_items <= bound))
            .or_else(|| tiers.last());

        match tier {
            Some(tier) => sanitize(tier),
            None => FALLBACK_LIMITS,
        }
    }
}

/// Keep limits positive with loading strictly below loaded, even for
/// hand-built (unvalidated) tier tables.
fn sanitize(tier: &CapacityTier) -> CapacityLimits {
    let max_loaded = tier.max_loaded.max(2);
    let max_concurrent_loading = tier.max_concurrent_loading.clamp(1, max_loaded - 1);
    CapacityLimits {
        max_loaded,
        max_concurrent_loading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_generous_catalog() {
        let policy = CapacityPolicy::default();
        let limits = policy.limits(50, CapacityMode::Generous);
        assert_eq!(limits.max_loaded, 40);
        assert_eq!(limits.max_concurrent_loading, 4);
    }

    #[test]
    fn test_limits_shrink_as_catalog_grows() {
        let policy = CapacityPolicy::default();
        for mode in [CapacityMode::Constrained, CapacityMode::Generous] {
            let mut previous = policy.limits(0, mode);
            for total in [50, 100, 101, 500, 501, 2000, 2001, 1_000_000] {
                let limits = policy.limits(total, mode);
                assert!(limits.max_loaded <= previous.max_loaded);
                previous = limits;
            }
        }
    }

    #[test]
    fn test_generous_at_least_constrained() {
        let policy = CapacityPolicy::default();
        for total in [0, 10, 150, 900, 5000] {
            let c = policy.limits(total, CapacityMode::Constrained);
            let g = policy.limits(total, CapacityMode::Generous);
            assert!(g.max_loaded >= c.max_loaded);
            assert!(g.max_concurrent_loading >= c.max_concurrent_loading);
        }
    }

    #[test]
    fn test_limits_positive_and_ordered() {
        let policy = CapacityPolicy::default();
        for total in (0..5000).step_by(37) {
            for mode in [CapacityMode::Constrained, CapacityMode::Generous] {
                let limits = policy.limits(total, mode);
                assert!(limits.max_concurrent_loading > 0);
                assert!(limits.max_concurrent_loading < limits.max_loaded);
            }
        }
    }

    #[test]
    fn test_bounded_last_tier_extends_to_larger_catalogs() {
        let params = CapacityParams {
            constrained: vec![CapacityTier {
                max_items: Some(10),
                max_loaded: 6,
                max_concurrent_loading: 2,
            }],
            ..CapacityParams::default()
        };
        let policy = CapacityPolicy::new(params);
        assert_eq!(policy.limits(10_000, CapacityMode::Constrained).max_loaded, 6);
    }

    #[test]
    fn test_empty_table_and_degenerate_tier() {
        let params = CapacityParams {
            constrained: Vec::new(),
            generous: vec![CapacityTier {
                max_items: None,
                max_loaded: 1,
                max_concurrent_loading: 5,
            }],
            ..CapacityParams::default()
        };
        let policy = CapacityPolicy::new(params);
        assert_eq!(policy.limits(3, CapacityMode::Constrained), FALLBACK_LIMITS);

        let limits = policy.limits(3, CapacityMode::Generous);
        assert_eq!(limits.max_loaded, 2);
        assert_eq!(limits.max_concurrent_loading, 1);
    }
}
