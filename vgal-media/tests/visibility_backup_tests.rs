//! Dual-path visibility: intersection reports and the owner's backup mark

mod helpers;

use helpers::{drain_events, fixture, local_items, tight_params, url_of};
use std::time::Duration;
use vgal_common::events::MediaEvent;
use vgal_media::ItemLoadState;

#[tokio::test(start_paused = true)]
async fn test_owner_mark_loads_without_intersection() {
    let items = local_items(4);
    let url = url_of(&items[2]);
    let mut fx = fixture(&tight_params(10, 2), items);
    let id = fx.ids[2];

    fx.gallery.mark_visible(id, true).unwrap();
    fx.gallery.settle().await;

    assert_eq!(fx.gallery.state(&id), Some(ItemLoadState::Loaded));
    assert_eq!(fx.backend.load_attempts(&url), 1);
    assert!(fx.gallery.visibility().is_owner_marked(&id));
    assert!(!fx.gallery.visibility().is_intersecting(&id));
}

#[tokio::test(start_paused = true)]
async fn test_nothing_loads_without_either_signal() {
    let mut fx = fixture(&tight_params(10, 2), local_items(8));

    for _ in 0..5 {
        fx.gallery.tick();
        fx.gallery.settle().await;
    }

    assert_eq!(fx.backend.total_load_attempts(), 0);
    for id in &fx.ids {
        assert_eq!(fx.gallery.state(id), Some(ItemLoadState::Idle));
    }
}

#[tokio::test(start_paused = true)]
async fn test_both_paths_issue_a_single_load() {
    let items = local_items(2);
    let url = url_of(&items[0]);
    let mut fx = fixture(&tight_params(10, 2), items);
    let id = fx.ids[0];

    fx.gallery.report_intersection(id, true).unwrap();
    fx.gallery.mark_visible(id, true).unwrap();
    fx.gallery.mark_visible(id, true).unwrap();
    fx.gallery.tick();
    fx.gallery.settle().await;

    fx.gallery.mark_visible(id, true).unwrap();
    fx.gallery.tick();
    fx.gallery.settle().await;

    assert_eq!(fx.backend.load_attempts(&url), 1);
    let visibility_events = drain_events(&mut fx.events)
        .into_iter()
        .filter(|event| matches!(event, MediaEvent::VisibilityChanged { .. }))
        .count();
    assert_eq!(visibility_events, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backup_sweep_reloads_owner_marked_item_after_eviction() {
    let items = local_items(6);
    let url = url_of(&items[0]);
    let mut fx = fixture(&tight_params(3, 1), items);
    let marked = fx.ids[0];

    // Marked item loads, then the owner clears the mark and it gets evicted
    fx.gallery.mark_visible(marked, true).unwrap();
    fx.gallery.settle().await;
    fx.gallery.mark_visible(marked, false).unwrap();
    for id in fx.ids[1..5].to_vec() {
        fx.gallery.report_intersection(id, true).unwrap();
    }
    fx.gallery.settle().await;
    let evicted = fx.gallery.tick();
    assert_eq!(evicted, vec![marked]);
    assert_eq!(fx.gallery.state(&marked), Some(ItemLoadState::Idle));

    // Mark again: the item is idle, so the mark loads it a second time
    fx.gallery.mark_visible(marked, true).unwrap();
    fx.gallery.tick();
    fx.gallery.settle().await;
    assert_eq!(fx.gallery.state(&marked), Some(ItemLoadState::Loaded));
    assert_eq!(fx.backend.load_attempts(&url), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_items_lose_protection() {
    let mut fx = fixture(&tight_params(3, 1), local_items(6));
    for id in fx.ids[..5].to_vec() {
        fx.gallery.report_intersection(id, true).unwrap();
    }
    fx.gallery.settle().await;

    // All five visible: nothing may be evicted
    assert!(fx.gallery.tick().is_empty());
    assert_eq!(fx.gallery.stats().loaded, 5);

    for id in fx.ids[..2].to_vec() {
        fx.gallery.report_intersection(id, false).unwrap();
    }
    // The fruitless pass above still started a throttle interval
    assert!(fx.gallery.tick().is_empty());
    tokio::time::advance(Duration::from_millis(150)).await;
    let evicted = fx.gallery.tick();
    assert_eq!(evicted.len(), 2);
    assert_eq!(fx.gallery.stats().loaded, 3);
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_loads_neighbours_within_capacity() {
    let mut params = tight_params(6, 2);
    params.visibility.prefetch_margin = 2;
    let mut fx = fixture(&params, local_items(20));

    fx.gallery.report_intersection(fx.ids[10], true).unwrap();
    fx.gallery.settle().await;
    // Two loading slots: neighbours come in over successive ticks
    for _ in 0..3 {
        fx.gallery.tick();
        fx.gallery.settle().await;
    }

    for index in 8..=12 {
        assert_eq!(
            fx.gallery.state(&fx.ids[index]),
            Some(ItemLoadState::Loaded),
            "item {} should be prefetched",
            index
        );
    }
    assert_eq!(fx.gallery.state(&fx.ids[7]), Some(ItemLoadState::Idle));
    assert_eq!(fx.gallery.state(&fx.ids[13]), Some(ItemLoadState::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_no_prefetch_by_default() {
    let mut fx = fixture(&tight_params(6, 2), local_items(20));
    fx.gallery.report_intersection(fx.ids[10], true).unwrap();
    fx.gallery.tick();
    fx.gallery.settle().await;
    assert_eq!(fx.backend.total_load_attempts(), 1);
}
