//! End-to-end visibility scenarios against the in-memory layout host

mod common;

use common::{host_with_scroller, in_scroller, scheduler, scheduler_with, settle, Hits, SCROLLER};
use lazyload_watcher::{
    Container, EventTarget, GroupingPolicy, LazyLoadOptions, NodeId, Rect, SchedulerConfig,
    SchedulerError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const SCROLL: Container = Container::Node(SCROLLER);

#[tokio::test(start_paused = true)]
async fn test_visible_at_registration_fires_without_events() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 100.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(250, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;

    assert_eq!(hits.get(), 1);
    assert!(!element.is_pending());
    assert!(!scheduler.is_registered(&element));
    assert_eq!(scheduler.group_count(), 0);
    assert_eq!(host.total_listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shared_group_attaches_one_listener_set() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    host.insert(NodeId(2), Some(SCROLLER), Rect::new(0.0, 2000.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let a = hits.watch(&scheduler, NodeId(1), &in_scroller(250, true));
    let b = hits.watch(&scheduler, NodeId(2), &in_scroller(250, true));
    scheduler.on_attach(&a).unwrap();
    scheduler.on_attach(&b).unwrap();
    settle().await;

    assert_eq!(scheduler.group_count(), 1);
    assert_eq!(scheduler.member_count(&scheduler.group_key(&a)), 2);
    assert_eq!(host.listener_count(EventTarget::Window), 1);
    assert_eq!(host.listener_count(EventTarget::Node(SCROLLER)), 3);
}

#[tokio::test(start_paused = true)]
async fn test_last_unregister_detaches_listeners() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    host.insert(NodeId(2), Some(SCROLLER), Rect::new(0.0, 2000.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let a = hits.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    let b = hits.watch(&scheduler, NodeId(2), &in_scroller(0, true));
    scheduler.register(&a).unwrap();
    scheduler.register(&b).unwrap();
    settle().await;

    scheduler.unregister(&a).unwrap();
    assert_eq!(host.total_listener_count(), 4);
    scheduler.unregister(&b).unwrap();
    assert_eq!(host.total_listener_count(), 0);

    let probes = host.probe_calls();
    host.scroll_by(SCROLL, 0.0, 1000.0);
    host.resize_window(1024.0, 768.0);
    settle().await;

    assert_eq!(host.probe_calls(), probes);
    assert_eq!(hits.get(), 0);
    assert!(matches!(
        scheduler.unregister(&a),
        Err(SchedulerError::NotRegistered(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_scroll_into_expanded_viewport_fires_once() {
    let host = host_with_scroller();
    // Below the 500px scroller even with the 150px bottom margin
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 700.0, 300.0, 100.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let options = LazyLoadOptions {
        offset_bottom: 150.0,
        ..in_scroller(250, false)
    };
    let element = hits.watch(&scheduler, NodeId(1), &options);
    scheduler.on_attach(&element).unwrap();
    settle().await;
    assert_eq!(hits.get(), 0);

    // Top edge moves to 500, inside the expanded bottom edge at 650
    host.scroll_by(SCROLL, 0.0, 200.0);
    settle().await;
    assert_eq!(hits.get(), 1);

    let probes = host.probe_calls();
    for _ in 0..5 {
        host.scroll_by(SCROLL, 0.0, 50.0);
        sleep(Duration::from_millis(300)).await;
    }
    settle().await;

    assert_eq!(hits.get(), 1);
    assert_eq!(host.probe_calls(), probes);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_events_notifies_once() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;

    host.hold_probes();
    host.scroll_to(SCROLL, 0.0, 800.0);
    settle().await;
    let in_flight = host.probe_calls();
    assert_eq!(in_flight, 2);

    // Triggers while the probe is in flight are skipped
    for _ in 0..50 {
        host.touch_move(SCROLL);
        host.transition_end(SCROLL);
    }
    settle().await;
    assert_eq!(host.probe_calls(), in_flight);
    assert!(element.is_checking());

    host.release_probes();
    settle().await;
    for _ in 0..50 {
        host.scroll_by(SCROLL, 0.0, 1.0);
    }
    settle().await;

    assert_eq!(hits.get(), 1);
    assert_eq!(host.probe_calls(), in_flight);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_group_probes_after_quiet_period() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(250, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;
    let eager = host.probe_calls();

    for step in 1..=10 {
        host.scroll_to(SCROLL, 0.0, step as f64 * 80.0);
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(host.probe_calls(), eager);
    assert_eq!(hits.get(), 0);

    sleep(Duration::from_millis(250)).await;
    settle().await;

    assert_eq!(host.probe_calls(), eager + 1);
    assert_eq!(hits.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detach_during_probe_suppresses_notification() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 100.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    host.hold_probes();
    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(250, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;
    assert_eq!(host.probe_calls(), 1);
    assert!(element.is_checking());

    scheduler.on_detach(&element);
    host.release_probes();
    settle().await;

    assert_eq!(hits.get(), 0);
    assert!(element.is_pending());
    assert!(!element.is_checking());
    assert_eq!(host.total_listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_keeps_element_eligible() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 100.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    host.fail_probes(NodeId(1), true);
    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;

    assert_eq!(hits.get(), 0);
    assert!(element.is_pending());
    assert!(!element.is_checking());
    assert!(scheduler.is_registered(&element));

    host.fail_probes(NodeId(1), false);
    host.transition_end(SCROLL);
    settle().await;
    assert_eq!(hits.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detached_node_probes_not_visible() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 100.0, 300.0, 50.0));
    host.set_attached(NodeId(1), false);
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;
    assert_eq!(hits.get(), 0);

    host.set_attached(NodeId(1), true);
    assert!(scheduler.on_props_changed(&element));
    settle().await;
    assert_eq!(hits.get(), 1);
    assert!(!scheduler.on_props_changed(&element));
}

#[tokio::test(start_paused = true)]
async fn test_members_resolve_independently() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 600.0, 300.0, 50.0));
    host.insert(NodeId(2), Some(SCROLLER), Rect::new(0.0, 3000.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let first = Hits::default();
    let second = Hits::default();

    let a = first.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    let b = second.watch(&scheduler, NodeId(2), &in_scroller(0, true));
    scheduler.on_attach(&a).unwrap();
    scheduler.on_attach(&b).unwrap();
    settle().await;

    host.scroll_to(SCROLL, 0.0, 200.0);
    settle().await;

    assert_eq!(first.get(), 1);
    assert_eq!(second.get(), 0);
    assert_eq!(scheduler.group_count(), 1);
    assert_eq!(scheduler.member_count(&scheduler.group_key(&b)), 1);
    assert_eq!(host.total_listener_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_window_resize_triggers_check() {
    let host = Arc::new(lazyload_watcher::MemoryHost::new(800.0, 600.0));
    host.insert(NodeId(1), None, Rect::new(0.0, 700.0, 100.0, 100.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let element = hits.watch(&scheduler, NodeId(1), &LazyLoadOptions {
        throttle: 0,
        ..Default::default()
    });
    scheduler.on_attach(&element).unwrap();
    settle().await;
    assert_eq!(hits.get(), 0);

    host.resize_window(800.0, 900.0);
    settle().await;
    assert_eq!(hits.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_register_from_notification() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 100.0, 300.0, 50.0));
    host.insert(NodeId(2), Some(SCROLLER), Rect::new(0.0, 200.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let second = hits.watch(&scheduler, NodeId(2), &in_scroller(250, true));
    let chained = Arc::new(AtomicUsize::new(0));

    let first = {
        let registrar = scheduler.clone();
        let second = Arc::clone(&second);
        let chained = Arc::clone(&chained);
        scheduler.watch(NodeId(1), &in_scroller(250, true), move || {
            if registrar.register(&second).is_ok() {
                chained.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    scheduler.on_attach(&first).unwrap();
    settle().await;

    assert_eq!(chained.load(Ordering::SeqCst), 1);
    assert_eq!(hits.get(), 1);
    assert!(!second.is_pending());
    assert_eq!(scheduler.group_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retired_element_cannot_register_again() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 100.0, 300.0, 50.0));
    let scheduler = scheduler(&host);
    let hits = Hits::default();

    let element = hits.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    scheduler.on_attach(&element).unwrap();
    settle().await;

    assert!(matches!(
        scheduler.on_attach(&element),
        Err(SchedulerError::AlreadyVisible(_))
    ));
    assert_eq!(hits.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_container_grouping_from_config() {
    let host = host_with_scroller();
    host.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    host.insert(NodeId(2), Some(SCROLLER), Rect::new(0.0, 2000.0, 300.0, 50.0));
    let config = SchedulerConfig {
        grouping: GroupingPolicy::ByContainer,
    };
    let scheduler = scheduler_with(&host, config);
    let hits = Hits::default();

    let a = hits.watch(&scheduler, NodeId(1), &in_scroller(0, true));
    let b = hits.watch(&scheduler, NodeId(2), &in_scroller(100, false));
    scheduler.on_attach(&a).unwrap();
    scheduler.on_attach(&b).unwrap();
    settle().await;

    assert_eq!(scheduler.group_count(), 1);
    assert_eq!(scheduler.group_key(&a), scheduler.group_key(&b));
    assert_eq!(host.total_listener_count(), 4);

    host.scroll_to(SCROLL, 0.0, 1900.0);
    settle().await;
    assert_eq!(hits.get(), 1);
    assert!(a.is_pending());
    assert!(!b.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_isolated_schedulers() {
    let host_a = host_with_scroller();
    let host_b = host_with_scroller();
    host_a.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    host_b.insert(NodeId(1), Some(SCROLLER), Rect::new(0.0, 1000.0, 300.0, 50.0));
    let scheduler_a = scheduler(&host_a);
    let scheduler_b = scheduler(&host_b);
    let hits = Hits::default();

    let a = hits.watch(&scheduler_a, NodeId(1), &in_scroller(0, true));
    let b = hits.watch(&scheduler_b, NodeId(1), &in_scroller(0, true));
    scheduler_a.on_attach(&a).unwrap();
    scheduler_b.on_attach(&b).unwrap();
    settle().await;

    host_a.scroll_to(SCROLL, 0.0, 900.0);
    settle().await;

    assert_eq!(hits.get(), 1);
    assert!(!a.is_pending());
    assert!(b.is_pending());
    assert_eq!(scheduler_b.group_count(), 1);
}
