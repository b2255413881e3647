//! Property tests for the resource manager invariants, the eviction
//! engine's protection guarantee and URL construction

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;
use vgal_common::params::CapacityParams;
use vgal_media::capacity::{CapacityMode, CapacityPolicy};
use vgal_media::eviction::{plan_eviction, RankKey};
use vgal_media::source_url::{local_path_to_url, resource_url};
use vgal_media::{CatalogItem, ResourceManager};

const ITEMS: usize = 60;

#[derive(Debug, Clone)]
enum Op {
    SetVisible(usize, bool),
    Begin(usize),
    Complete(usize),
    Abort(usize),
    Play(usize),
    Pause(usize),
    Release(usize),
    Cleanup,
    DrainDeferred,
    Advance(u64),
    Resize(usize),
    SwitchMode(CapacityMode),
}

fn arb_op() -> impl Strategy<Value = Op> {
    let index = 0..ITEMS;
    prop_oneof![
        3 => (index.clone(), any::<bool>()).prop_map(|(i, v)| Op::SetVisible(i, v)),
        5 => index.clone().prop_map(Op::Begin),
        4 => index.clone().prop_map(Op::Complete),
        1 => index.clone().prop_map(Op::Abort),
        2 => index.clone().prop_map(Op::Play),
        1 => index.clone().prop_map(Op::Pause),
        1 => index.prop_map(Op::Release),
        2 => Just(Op::Cleanup),
        2 => Just(Op::DrainDeferred),
        1 => (0u64..3000).prop_map(Op::Advance),
        1 => (1usize..5000).prop_map(Op::Resize),
        1 => arb_mode().prop_map(Op::SwitchMode),
    ]
}

fn arb_mode() -> impl Strategy<Value = CapacityMode> {
    prop_oneof![Just(CapacityMode::Constrained), Just(CapacityMode::Generous)]
}

proptest! {
    /// playing ⊆ loaded, loading ∩ loaded = ∅ and |loading| ≤ max after
    /// every operation (loads started before the limits shrank may finish);
    /// visible items are always admitted; cleanup never selects a protected
    /// item.
    #[test]
    fn prop_manager_invariants_hold(
        total in 1usize..3000,
        mode in arb_mode(),
        ops in prop::collection::vec(arb_op(), 1..300),
    ) {
        let ids: Vec<Uuid> = (0..ITEMS).map(|_| Uuid::new_v4()).collect();
        let mut manager = ResourceManager::new(
            CapacityPolicy::new(CapacityParams::default()),
            mode,
            Duration::from_secs(2),
        );
        manager.set_catalog_order(ids.iter().copied());
        manager.set_total_items(total);

        let base = Instant::now();
        let mut now = base;

        for op in ops {
            match op {
                Op::SetVisible(i, visible) => {
                    manager.set_visible(ids[i], visible, now);
                }
                Op::Begin(i) => {
                    let before = manager.sets().loading().len();
                    let at_limit = before >= manager.limits().max_concurrent_loading;
                    manager.try_begin_loading(ids[i], now);
                    if at_limit {
                        prop_assert_eq!(manager.sets().loading().len(), before);
                    }
                }
                Op::Complete(i) => {
                    manager.complete_loading(&ids[i], now);
                }
                Op::Abort(i) => {
                    manager.abort_loading(&ids[i]);
                }
                Op::Play(i) => {
                    let _ = manager.mark_playing(&ids[i], now);
                }
                Op::Pause(i) => {
                    manager.mark_paused(&ids[i], now);
                }
                Op::Release(i) => {
                    manager.release(&ids[i]);
                }
                Op::Cleanup => {
                    if let Some(plan) = manager.perform_cleanup(now) {
                        for victim in plan.victims() {
                            prop_assert!(!manager.sets().is_protected(victim));
                        }
                        let before = manager.sets().loaded().len();
                        let removed = manager.apply_cleanup(&plan, now);
                        prop_assert_eq!(manager.sets().loaded().len(), before - removed.len());
                    }
                }
                Op::DrainDeferred => {
                    while manager.start_next_deferred(now).is_some() {}
                }
                Op::Advance(ms) => {
                    now += Duration::from_millis(ms);
                }
                Op::Resize(total) => {
                    manager.set_total_items(total);
                }
                Op::SwitchMode(mode) => {
                    manager.set_mode(mode);
                }
            }

            if let Err(violation) = manager.check_invariants() {
                prop_assert!(false, "{}", violation);
            }
            for id in manager.sets().visible() {
                prop_assert!(manager.can_load(id));
            }
        }
    }

    /// The reducer never touches protected ids and removes exactly the
    /// excess when enough candidates exist
    #[test]
    fn prop_eviction_respects_protection(
        loaded_count in 0usize..80,
        protected_mask in prop::collection::vec(any::<bool>(), 80),
        max_loaded in 1usize..40,
    ) {
        let loaded_ids: Vec<Uuid> = (0..loaded_count).map(|_| Uuid::new_v4()).collect();
        let loaded: HashSet<Uuid> = loaded_ids.iter().copied().collect();
        let protected: HashSet<Uuid> = loaded_ids
            .iter()
            .zip(protected_mask.iter())
            .filter(|(_, p)| **p)
            .map(|(id, _)| *id)
            .collect();

        let plan = plan_eviction(&loaded, max_loaded, |id| protected.contains(id), |id| RankKey {
            distance: (id.as_u128() % 97) as usize,
            last_used: None,
        });

        let candidates = loaded.len() - protected.len();
        match plan {
            None => prop_assert!(loaded.len() <= max_loaded || candidates == 0),
            Some(plan) => {
                let after = plan.apply(&loaded);
                prop_assert!(protected.is_subset(&after));
                prop_assert!(plan.victims().iter().all(|id| !protected.contains(id)));
                let excess = loaded.len() - max_loaded;
                prop_assert_eq!(plan.victims().len(), excess.min(candidates));
            }
        }
    }

    /// Building the URL twice yields the same bytes; separators are always
    /// forward slashes and never an encoded backslash
    #[test]
    fn prop_local_url_idempotent(path in r"[A-Za-z0-9 #%?&/\\._-]{0,48}") {
        let first = local_path_to_url(&path);
        let second = local_path_to_url(&path);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.starts_with("file://"));
        prop_assert!(!first.contains('\\'));
        prop_assert!(!first.to_ascii_uppercase().contains("%5C"));
        prop_assert!(!first.contains(' '));
        prop_assert!(!first.contains('#'));
    }

    /// A built URL used as the locator of another item comes back unchanged
    #[test]
    fn prop_file_url_locator_is_fixed_point(path in r"[A-Za-z0-9 #%?&/\\._-]{0,48}") {
        let url = resource_url(&CatalogItem::local(path.clone()));
        let rebuilt = resource_url(&CatalogItem::from_locator(url.clone()));
        prop_assert_eq!(&rebuilt, &url);

        let raw = resource_url(&CatalogItem::from_locator(format!("file://{}", path)));
        prop_assert!(!raw.contains('\\'));
        prop_assert!(!raw.contains(' '));
        prop_assert!(!raw.contains('#'));
    }
}

#[test]
fn test_url_for_mixed_separators() {
    let url = local_path_to_url(r"C:\Users\me\My Videos/clip #2.mp4");
    assert_eq!(url, "file:///C:/Users/me/My%20Videos/clip%20%232.mp4");
    assert_eq!(url, local_path_to_url(r"C:\Users\me\My Videos/clip #2.mp4"));
}
