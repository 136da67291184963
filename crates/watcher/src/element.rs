//! Watched elements and their one-shot visibility state

use crate::ratelimit::RateLimiter;
use lazyload_core::{Container, LazyLoadOptions, NodeId, Offsets, TimingPolicy, WatchId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Notification fired the first time an element is seen visible
pub type VisibleCallback = Box<dyn FnOnce() + Send>;

/// Unit of observation
///
/// `pending` starts true and flips to false exactly once. `checking` guards
/// against overlapping probes for the same element.
pub struct WatchedElement {
    id: WatchId,
    node: NodeId,
    container: Container,
    offsets: Offsets,
    policy: TimingPolicy,
    pending: AtomicBool,
    checking: AtomicBool,
    on_visible: Mutex<Option<VisibleCallback>>,
    /// Per-element limiter, only used when groups are keyed by container alone
    limiter: Mutex<Option<Arc<RateLimiter>>>,
}

impl WatchedElement {
    pub fn new(
        node: NodeId,
        container: Container,
        offsets: Offsets,
        policy: TimingPolicy,
        on_visible: Option<VisibleCallback>,
    ) -> Self {
        Self {
            id: WatchId::next(),
            node,
            container,
            offsets,
            policy,
            pending: AtomicBool::new(true),
            checking: AtomicBool::new(false),
            on_visible: Mutex::new(on_visible),
            limiter: Mutex::new(None),
        }
    }

    /// Build from per-element options
    pub fn from_options(
        node: NodeId,
        options: &LazyLoadOptions,
        on_visible: Option<VisibleCallback>,
    ) -> Self {
        Self::new(
            node,
            options.container(),
            options.offsets(),
            options.timing_policy(),
            on_visible,
        )
    }

    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn offsets(&self) -> Offsets {
        self.offsets
    }

    pub fn policy(&self) -> TimingPolicy {
        self.policy
    }

    /// Not yet seen visible
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// A probe is in flight
    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    /// Claim the probe slot; false if pending is over or a probe is in flight
    pub(crate) fn try_begin_check(&self) -> bool {
        self.is_pending()
            && self
                .checking
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    pub(crate) fn end_check(&self) {
        self.checking.store(false, Ordering::Release);
    }

    /// Claim the probe slot, releasing it when the guard drops
    ///
    /// The slot is released even if the probe panics.
    pub(crate) fn begin_check(self: &Arc<Self>) -> Option<CheckGuard> {
        self.try_begin_check()
            .then(|| CheckGuard(Arc::clone(self)))
    }

    /// Leave the pending state; true only for the first caller
    pub(crate) fn mark_visible(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Invoke the notification; later calls do nothing
    pub(crate) fn notify(&self) {
        let callback = self.on_visible.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Install a per-element limiter, returning the one it replaces
    pub(crate) fn install_limiter(&self, limiter: RateLimiter) -> Option<Arc<RateLimiter>> {
        self.limiter.lock().replace(Arc::new(limiter))
    }

    /// Drop the per-element limiter, cancelling any trailing run
    pub(crate) fn clear_limiter(&self) {
        let limiter = self.limiter.lock().take();
        drop(limiter);
    }

    /// Route a trigger through the per-element limiter; false if there is none
    ///
    /// The limiter runs with the slot unlocked, since its callback takes the
    /// group's member lock.
    pub(crate) fn call_limiter(&self) -> bool {
        let limiter = self.limiter.lock().clone();
        match limiter {
            Some(limiter) => {
                limiter.call();
                true
            }
            None => false,
        }
    }
}

/// Held while a probe for the element is in flight
pub(crate) struct CheckGuard(Arc<WatchedElement>);

impl Drop for CheckGuard {
    fn drop(&mut self) {
        self.0.end_check();
    }
}

impl fmt::Debug for WatchedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedElement")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("container", &self.container)
            .field("offsets", &self.offsets)
            .field("policy", &self.policy)
            .field("pending", &self.is_pending())
            .field("checking", &self.is_checking())
            .finish()
    }
}
