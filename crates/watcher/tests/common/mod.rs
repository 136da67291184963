//! Shared helpers for scheduler integration tests

use lazyload_watcher::{
    LazyLoadOptions, MemoryHost, NodeId, Rect, Scheduler, SchedulerConfig, WatchedElement,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scrollable container used by most scenarios
pub const SCROLLER: NodeId = NodeId(100);

/// Let spawned probe tasks run to completion
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Window 800x600 with a 300x500 scroller at the top-left
pub fn host_with_scroller() -> Arc<MemoryHost> {
    let host = Arc::new(MemoryHost::new(800.0, 600.0));
    host.insert_scroller(SCROLLER, None, Rect::new(0.0, 0.0, 300.0, 500.0));
    host
}

pub fn scheduler(host: &Arc<MemoryHost>) -> Scheduler {
    scheduler_with(host, SchedulerConfig::default())
}

pub fn scheduler_with(host: &Arc<MemoryHost>, config: SchedulerConfig) -> Scheduler {
    Scheduler::new(host.clone(), host.clone(), config).expect("inside a runtime")
}

/// Notification counter
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn watch(
        &self,
        scheduler: &Scheduler,
        node: NodeId,
        options: &LazyLoadOptions,
    ) -> Arc<WatchedElement> {
        let counter = Arc::clone(&self.0);
        scheduler.watch(node, options, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Options for an element inside the scroller
pub fn in_scroller(throttle: i64, debounce: bool) -> LazyLoadOptions {
    LazyLoadOptions {
        container: Some(SCROLLER),
        throttle,
        debounce,
        ..Default::default()
    }
}
